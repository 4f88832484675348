use crate::service::SERVICE_PORT;
use std::fmt::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "Managed by rb-reputation-ctl. Local changes will be overwritten.";

/// Mode of every rendered config file
pub const CONFIG_FILE_MODE: u32 = 0o644;

/// Variables the config files are rendered from
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub memory: u32,
    pub aerospike_ips: &'a [String],
}

/// The three configuration files of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFile {
    InitOptions,
    Properties,
    Weights,
}

impl ConfigFile {
    pub const ALL: [ConfigFile; 3] = [
        ConfigFile::InitOptions,
        ConfigFile::Properties,
        ConfigFile::Weights,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigFile::InitOptions => "init_options.sh",
            ConfigFile::Properties => "config.properties",
            ConfigFile::Weights => "weights.yml",
        }
    }

    pub fn path_in(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(self.file_name())
    }

    pub fn render(&self, vars: &TemplateVars<'_>) -> String {
        match self {
            ConfigFile::InitOptions => render_init_options(vars),
            ConfigFile::Properties => render_properties(vars),
            ConfigFile::Weights => render_weights(vars),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub kind: ConfigFile,
    pub path: PathBuf,
    pub content: String,
}

/// Render all three files for `config_dir`
pub fn render_all(config_dir: &Path, vars: &TemplateVars<'_>) -> Vec<RenderedConfig> {
    ConfigFile::ALL
        .iter()
        .map(|kind| RenderedConfig {
            kind: *kind,
            path: kind.path_in(config_dir),
            content: kind.render(vars),
        })
        .collect()
}

fn render_init_options(vars: &TemplateVars<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#!/bin/bash");
    let _ = writeln!(out, "# {}", HEADER);
    let _ = writeln!(out);
    let _ = writeln!(out, "MEMORY=\"{}m\"", vars.memory);
    let _ = writeln!(
        out,
        "JAVA_OPTS=\"-Xms${{MEMORY}} -Xmx${{MEMORY}} -XX:+UseG1GC -Djava.net.preferIPv4Stack=true\""
    );
    let _ = writeln!(out, "export MEMORY JAVA_OPTS");
    out
}

fn render_properties(vars: &TemplateVars<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", HEADER);
    let _ = writeln!(out, "server.port={}", SERVICE_PORT);
    let _ = writeln!(out, "aerospike.hosts={}", vars.aerospike_ips.join(","));
    let _ = writeln!(out, "aerospike.port=3000");
    let _ = writeln!(out, "cache.memory.mb={}", vars.memory);
    out
}

fn render_weights(vars: &TemplateVars<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", HEADER);
    let _ = writeln!(out, "cache:");
    let _ = writeln!(out, "  max_memory_mb: {}", vars.memory);
    let _ = writeln!(out, "weights:");
    let _ = writeln!(out, "  static_lists: 0.40");
    let _ = writeln!(out, "  sandbox: 0.35");
    let _ = writeln!(out, "  history: 0.25");
    out
}
