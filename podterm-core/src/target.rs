//! Session targets: which container to exec into or follow logs from

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Tail length used when a log request leaves `tailLines` unset or zero
pub const DEFAULT_TAIL_LINES: i64 = 1000;

/// Namespace used when a handshake leaves it empty
pub const DEFAULT_NAMESPACE: &str = "default";

/// Address of a single container in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub namespace: String,
    pub pod: String,
    /// `None` lets the API server pick the pod's default container
    pub container: Option<String>,
}

impl ContainerRef {
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.filter(|c| !c.is_empty()),
        }
    }
}

/// Exec handshake, sent by the client as the first frame of an exec session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecTarget {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub pod_name: String,
    #[serde(default)]
    pub container_name: String,
    /// Command run through the shell with `-c`; empty starts an interactive shell
    #[serde(default)]
    pub command: String,
}

impl ExecTarget {
    /// Decode and validate the handshake frame
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let mut target: ExecTarget = serde_json::from_slice(bytes)?;

        if target.pod_name.trim().is_empty() {
            return Err(FrameError::Malformed("podName is required".to_string()));
        }
        if target.namespace.trim().is_empty() {
            target.namespace = DEFAULT_NAMESPACE.to_string();
        }

        Ok(target)
    }

    pub fn container_ref(&self) -> ContainerRef {
        ContainerRef::new(
            self.namespace.clone(),
            self.pod_name.clone(),
            Some(self.container_name.clone()),
        )
    }

    /// Command line to exec with the given shell
    pub fn command_line(&self, shell: &str) -> Vec<String> {
        if self.command.trim().is_empty() {
            vec![shell.to_string()]
        } else {
            vec![shell.to_string(), "-c".to_string(), self.command.clone()]
        }
    }
}

/// Follow-mode log request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub container: ContainerRef,
    pub tail_lines: i64,
    /// Read logs of the previous (terminated) container instance
    pub previous: bool,
}

impl LogTarget {
    /// Build a log target, applying [`DEFAULT_TAIL_LINES`] when `tail_lines`
    /// is missing or not positive.
    pub fn new(container: ContainerRef, tail_lines: Option<i64>, previous: bool) -> Self {
        let tail_lines = match tail_lines {
            Some(n) if n > 0 => n,
            _ => DEFAULT_TAIL_LINES,
        };
        Self {
            container,
            tail_lines,
            previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_exec_handshake() {
        let target = ExecTarget::decode(
            br#"{"namespace":"apps","podName":"web-0","containerName":"nginx","command":"ls"}"#,
        )
        .unwrap();
        assert_eq!(target.namespace, "apps");
        assert_eq!(target.pod_name, "web-0");
        assert_eq!(target.container_name, "nginx");
        assert_eq!(target.command, "ls");
    }

    #[test]
    fn empty_namespace_means_default() {
        let target = ExecTarget::decode(br#"{"podName":"web-0"}"#).unwrap();
        assert_eq!(target.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn missing_pod_name_is_malformed() {
        let err = ExecTarget::decode(br#"{"namespace":"apps"}"#).unwrap_err();
        assert_eq!(err, FrameError::Malformed("podName is required".to_string()));
    }

    #[test]
    fn non_json_handshake_is_malformed() {
        assert!(ExecTarget::decode(b"hello").is_err());
    }

    #[test]
    fn empty_container_name_is_none() {
        let target = ExecTarget::decode(br#"{"podName":"web-0","containerName":""}"#).unwrap();
        assert_eq!(target.container_ref().container, None);
    }

    #[test]
    fn command_line_without_command_is_interactive_shell() {
        let target = ExecTarget::decode(br#"{"podName":"web-0"}"#).unwrap();
        assert_eq!(target.command_line("/bin/bash"), vec!["/bin/bash"]);
    }

    #[test]
    fn command_line_wraps_command_with_shell() {
        let target = ExecTarget::decode(br#"{"podName":"web-0","command":"top -b"}"#).unwrap();
        assert_eq!(
            target.command_line("/bin/sh"),
            vec!["/bin/sh", "-c", "top -b"]
        );
    }

    #[test]
    fn log_target_defaults_tail_lines() {
        let container = ContainerRef::new("default", "x", Some(String::new()));
        assert_eq!(LogTarget::new(container.clone(), None, false).tail_lines, 1000);
        assert_eq!(LogTarget::new(container.clone(), Some(0), false).tail_lines, 1000);
        assert_eq!(LogTarget::new(container.clone(), Some(-5), false).tail_lines, 1000);
        assert_eq!(LogTarget::new(container, Some(50), false).tail_lines, 50);
    }
}
