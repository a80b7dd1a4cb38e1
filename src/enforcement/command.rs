use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ActionError, Firewall};
use crate::input::InputError;

/// Firewall driven by shell commands (`iptables-save`, `iptables -I ...`)
pub struct CommandFirewall {
    state_command: String,
    ban_command: String,
    ip_placeholder: String,
    dry_run: bool,
}

impl CommandFirewall {
    pub fn new(state_command: &str, ban_command: &str, ip_placeholder: &str) -> Self {
        CommandFirewall {
            state_command: state_command.to_string(),
            ban_command: ban_command.to_string(),
            ip_placeholder: ip_placeholder.to_string(),
            dry_run: false,
        }
    }

    /// Log ban commands instead of executing them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The ban command with the first placeholder replaced by `address`
    pub fn render_ban_command(&self, address: Ipv4Addr) -> String {
        self.ban_command
            .replacen(&self.ip_placeholder, &address.to_string(), 1)
    }
}

fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[async_trait]
impl Firewall for CommandFirewall {
    async fn current_state(&self) -> Result<String, InputError> {
        let output = shell(&self.state_command)
            .output()
            .await
            .map_err(|source| InputError::Spawn {
                command: self.state_command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(InputError::CommandFailed {
                command: self.state_command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn ban(&self, address: Ipv4Addr) -> Result<(), ActionError> {
        let command = self.render_ban_command(address);

        if self.dry_run {
            log::info!("[ban][dry-run] {}", command);
            return Ok(());
        }

        log::info!("[cmd] {}", command);
        let output = shell(&command)
            .output()
            .await
            .map_err(|source| ActionError::Spawn { address, source })?;

        if !output.status.success() {
            return Err(ActionError::CommandFailed {
                address,
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
