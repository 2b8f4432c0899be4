//! Command specifications: a program plus discrete arguments
//!
//! Arguments are never joined into a shell string. Arguments built from
//! credentials are marked secret and masked whenever the command is shown.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

const REDACTED: &str = "********";

#[derive(Clone, PartialEq, Eq)]
enum Arg {
    Plain(String),
    Secret(String),
}

impl Arg {
    fn value(&self) -> &str {
        match self {
            Arg::Plain(v) | Arg::Secret(v) => v,
        }
    }
}

/// A command to run: program path and ordered arguments
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<Arg>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    /// Append an argument that must never be logged
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Secret(arg.into()));
        self
    }

    /// Append a path argument
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    /// Append `flag value` when `value` is set; do nothing otherwise
    pub fn opt<S: Into<String>>(self, flag: &str, value: Option<S>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    /// Append `flag` alone when `enabled`
    pub fn flag_if(self, flag: &str, enabled: bool) -> Self {
        if enabled { self.arg(flag) } else { self }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Raw argument values, secrets included
    pub fn argv(&self) -> Vec<&str> {
        self.args.iter().map(Arg::value).collect()
    }

    /// Build the [`std::process::Command`] that runs this spec
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(Arg::value));
        cmd
    }
}

/// Redacted, shell-like rendering for logs and messages
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            match arg {
                Arg::Plain(v) if v.is_empty() => write!(f, " ''")?,
                Arg::Plain(v) if v.contains(char::is_whitespace) => write!(f, " '{v}'")?,
                Arg::Plain(v) => write!(f, " {v}")?,
                Arg::Secret(_) => write!(f, " {REDACTED}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandSpec")
            .field(&self.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_flags_are_omitted() {
        let cmd = CommandSpec::new("/opt/imcl")
            .arg("install")
            .opt("-installationDirectory", None::<String>)
            .opt("-properties", Some("a=1"))
            .flag_if("-connectPassportAdvantage", false)
            .flag_if("-acceptLicense", true);

        assert_eq!(
            cmd.argv(),
            vec!["install", "-properties", "a=1", "-acceptLicense"]
        );
    }

    #[test]
    fn test_display_redacts_secrets() {
        let cmd = CommandSpec::new("/was/bin/startServer.sh")
            .arg("server1")
            .arg("-password")
            .secret_arg("hunter2");

        let shown = cmd.to_string();
        assert_eq!(shown, "/was/bin/startServer.sh server1 -password ********");
        assert!(!format!("{cmd:?}").contains("hunter2"));
        assert_eq!(cmd.argv()[2], "hunter2");
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = CommandSpec::new("rm").arg("-rf").arg("/opt/my servers/a");
        assert_eq!(cmd.to_string(), "rm -rf '/opt/my servers/a'");
    }

    #[test]
    fn test_arguments_are_not_shell_split() {
        let cmd = CommandSpec::new("/bin/server").arg("create; rm -rf /");
        assert_eq!(cmd.argv(), vec!["create; rm -rf /"]);
    }
}
