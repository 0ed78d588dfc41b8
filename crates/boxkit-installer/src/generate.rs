use std::fs;

use anyhow::{Context, Result};

use crate::runner::Invocation;
use crate::Manager;

impl Manager {
    /// Writes the project `.envrc` so direnv exports the box environment
    /// and puts the shared bin dir on PATH.
    pub fn write_envrc(&self) -> Result<()> {
        let box_dir = self.layout().box_dir();
        let bin_dir = self.layout().bin_dir();

        let mut content = String::new();
        content.push_str(&format!(
            "export BOX_DIR={}\n",
            shell_escape(&box_dir.display().to_string())
        ));
        content.push_str(&format!(
            "export BOX_BIN_DIR={}\n",
            shell_escape(&bin_dir.display().to_string())
        ));
        content.push_str(&format!(
            "export BOX_OS={}\n",
            shell_escape(std::env::consts::OS)
        ));
        content.push_str(&format!(
            "export BOX_ARCH={}\n",
            shell_escape(std::env::consts::ARCH)
        ));
        content.push_str("PATH_add .box/bin\n");

        // BTreeMap iteration keeps the export block deterministic.
        for (key, value) in self.env() {
            content.push_str(&format!("export {}={}\n", key, shell_escape(value)));
        }

        let envrc_path = self.root().join(".envrc");
        self.log("Updating .envrc...");
        fs::write(&envrc_path, content)
            .with_context(|| format!("failed to write {}", envrc_path.display()))
    }

    pub fn allow_direnv(&self) -> Result<()> {
        self.log("Running direnv allow...");
        let mut invocation = Invocation::new("direnv", vec!["allow".to_string()]);
        invocation.current_dir = Some(self.root().to_path_buf());
        self.run_installer(invocation)
    }

    /// Writes a Dockerfile that provisions the package managers and runs a
    /// non-interactive install of the project's tools.
    pub fn write_dockerfile(&self) -> Result<()> {
        let dockerfile_path = self.root().join("Dockerfile");
        self.log("Generating Dockerfile...");
        fs::write(&dockerfile_path, DOCKERFILE_TEMPLATE)
            .with_context(|| format!("failed to write {}", dockerfile_path.display()))
    }
}

fn shell_escape(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

const DOCKERFILE_TEMPLATE: &str = r#"FROM debian:bookworm-slim

# Package manager feature flags
ARG INSTALL_GO=true
ARG INSTALL_NODE=true
ARG INSTALL_CARGO=true
ARG INSTALL_UV=true
ARG INSTALL_RUBY=true

# Install system dependencies and selected package managers
RUN apt-get update && \
    PACKAGES="curl ca-certificates git build-essential direnv" && \
    if [ "$INSTALL_NODE" = "true" ]; then PACKAGES="$PACKAGES nodejs npm"; fi && \
    if [ "$INSTALL_RUBY" = "true" ]; then PACKAGES="$PACKAGES ruby-full"; fi && \
    apt-get install -y --no-install-recommends $PACKAGES && \
    rm -rf /var/lib/apt/lists/*

# Install latest Go if enabled
RUN if [ "$INSTALL_GO" = "true" ]; then \
    curl -LsSf https://go.dev/dl/go1.24.0.linux-amd64.tar.gz | tar -C /usr/local -xz; \
    fi
ENV PATH="/usr/local/go/bin:${PATH}"

# Install cargo-binstall if enabled
RUN if [ "$INSTALL_CARGO" = "true" ]; then \
    curl -L --proto '=https' --tlsv1.2 -sSf https://raw.githubusercontent.com/cargo-bins/cargo-binstall/main/install.sh | sh && \
    if [ -f "$HOME/.cargo/bin/cargo-binstall" ]; then mv "$HOME/.cargo/bin/cargo-binstall" /usr/local/bin/; fi; \
    fi

# Install uv globally if enabled
RUN if [ "$INSTALL_UV" = "true" ]; then \
    curl -LsSf https://astral.sh/uv/install.sh | UV_INSTALL_DIR=/usr/local/bin sh; \
    fi

# Copy boxkit binary
COPY --link --chmod=755 boxkit /usr/local/bin/boxkit

# Set up user and workspace
RUN useradd -m -s /bin/bash boxkit
USER boxkit
WORKDIR /home/boxkit

# Copy configuration and install tools
COPY --chown=boxkit:boxkit box.yml .
ENV CGO_ENABLED=0
RUN boxkit install --non-interactive

# Add published binaries to PATH
ENV PATH="/home/boxkit/.box/bin:${PATH}"

CMD ["/bin/bash"]
"#;

#[cfg(test)]
mod tests {
    use super::shell_escape;
    use crate::runner::OutputSink;
    use crate::Manager;
    use std::collections::BTreeMap;
    use std::fs;

    fn test_manager() -> Manager {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        path.push(format!("boxkit-generate-tests-{}-{}", std::process::id(), nanos));
        fs::create_dir_all(&path).expect("must create root");
        let scratch = path.join("scratch");
        let mut manager = Manager::new(path, scratch, BTreeMap::new());
        manager.set_output(OutputSink::Quiet);
        manager
    }

    #[test]
    fn shell_escape_wraps_and_escapes_single_quotes() {
        assert_eq!(shell_escape("plain"), "'plain'");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
    }

    #[test]
    fn envrc_exports_box_paths_and_sorted_project_env() {
        let mut manager = test_manager();
        manager.env_mut().insert("ZED".to_string(), "1".to_string());
        manager.env_mut().insert("ABC".to_string(), "2".to_string());

        manager.write_envrc().expect("must write");
        let content = fs::read_to_string(manager.root().join(".envrc")).expect("must read");

        assert!(content.contains("export BOX_DIR="));
        assert!(content.contains("PATH_add .box/bin\n"));
        let abc_at = content.find("export ABC").expect("ABC must be exported");
        let zed_at = content.find("export ZED").expect("ZED must be exported");
        assert!(abc_at < zed_at, "env exports must be sorted");

        let _ = fs::remove_dir_all(manager.root());
    }

    #[test]
    fn dockerfile_installs_tools_non_interactively() {
        let manager = test_manager();
        manager.write_dockerfile().expect("must write");
        let content = fs::read_to_string(manager.root().join("Dockerfile")).expect("must read");
        assert!(content.contains("boxkit install --non-interactive"));
        assert!(content.contains("COPY --chown=boxkit:boxkit box.yml ."));

        let _ = fs::remove_dir_all(manager.root());
    }
}
