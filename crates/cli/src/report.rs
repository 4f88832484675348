use recipe::lifecycle::StatusReport;
use recipe::templates::RenderedConfig;
use std::fmt::Write;

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn format_status(service: &str, report: &StatusReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Service {}:", service);
    let _ = writeln!(out, "  enabled: {}", yes_no(report.service.enabled));
    let _ = writeln!(out, "  running: {}", yes_no(report.service.active));

    let _ = writeln!(out, "Config files:");
    for (path, info) in &report.files {
        match info {
            Some(info) => {
                let _ = writeln!(
                    out,
                    "  {} {:04o} {}:{}",
                    path.display(),
                    info.mode,
                    info.user,
                    info.group
                );
            }
            None => {
                let _ = writeln!(out, "  {} missing", path.display());
            }
        }
    }

    let _ = writeln!(out, "Registration:");
    let _ = writeln!(out, "  registered: {}", yes_no(report.registered));
    let listed = match report.agent_listed {
        Some(listed) => yes_no(listed),
        None => "unknown",
    };
    let _ = writeln!(out, "  listed by agent: {}", listed);

    out
}

pub fn format_rendered(rendered: &[RenderedConfig]) -> String {
    let mut out = String::new();
    for file in rendered {
        let _ = writeln!(out, "==> {} <==", file.path.display());
        out.push_str(&file.content);
        out.push('\n');
    }
    out
}

pub fn format_dry_run(calls: &[String]) -> String {
    if calls.is_empty() {
        return "Nothing to do\n".to_string();
    }

    let mut out = String::from("Planned changes:\n");
    for (i, call) in calls.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, call);
    }
    out
}
