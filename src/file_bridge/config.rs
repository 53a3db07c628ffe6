#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Shell prefix used for the one command that needs a redirection
    /// (the exec-pipe write). Everything else runs as a plain argv.
    pub shell: Vec<String>,
    /// Mode applied to files created by uploads and editor saves.
    /// World-writable by default; a deliberate simplification for shared
    /// dev containers, not a security boundary.
    pub default_file_mode: u32,
    /// Working directory for exec sessions inside the container.
    pub working_directory: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            shell: vec!["/bin/sh".to_string(), "-c".to_string()],
            default_file_mode: 0o666,
            working_directory: None,
        }
    }
}
