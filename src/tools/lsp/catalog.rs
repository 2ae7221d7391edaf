//! Per-extension language-server catalog (§4.K). Defaults cover Go,
//! TypeScript/TSX/JS/JSX, Python, and Rust.

pub struct ServerConfig {
    pub name: &'static str,
    pub command: &'static str,
    pub args: &'static [&'static str],
    pub extensions: &'static [&'static str],
    pub install_hint: &'static str,
}

pub const CATALOG: &[ServerConfig] = &[
    ServerConfig {
        name: "gopls",
        command: "gopls",
        args: &[],
        extensions: &["go"],
        install_hint: "install with: go install golang.org/x/tools/gopls@latest",
    },
    ServerConfig {
        name: "typescript-language-server",
        command: "typescript-language-server",
        args: &["--stdio"],
        extensions: &["ts", "tsx", "js", "jsx"],
        install_hint: "install with: npm install -g typescript-language-server typescript",
    },
    ServerConfig {
        name: "pylsp",
        command: "pylsp",
        args: &[],
        extensions: &["py"],
        install_hint: "install with: pip install python-lsp-server",
    },
    ServerConfig {
        name: "rust-analyzer",
        command: "rust-analyzer",
        args: &[],
        extensions: &["rs"],
        install_hint: "install with: rustup component add rust-analyzer",
    },
];

pub fn for_extension(extension: &str) -> Option<&'static ServerConfig> {
    CATALOG.iter().find(|server| server.extensions.contains(&extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_rust_extension() {
        assert_eq!(for_extension("rs").unwrap().name, "rust-analyzer");
    }

    #[test]
    fn unknown_extension_resolves_to_none() {
        assert!(for_extension("cobol").is_none());
    }
}
