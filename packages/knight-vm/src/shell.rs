//! The `` ` `` operator: run a command in the host shell and capture its
//! standard output.

use std::process::Command;

use knight_diagnostics::{Error, Result};

pub fn open_shell(command: &str) -> Result<String> {
    #[cfg(unix)]
    let output = Command::new("sh").arg("-c").arg(command).output();
    #[cfg(windows)]
    let output = Command::new("cmd").arg("/C").arg(command).output();

    let output = output
        .map_err(|err| Error::shell(format!("unable to execute `{command}`: {err}")))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn captures_standard_output() {
        assert_eq!(open_shell("echo hi").unwrap(), "hi\n");
    }

    #[test]
    #[cfg(unix)]
    fn standard_error_is_not_captured() {
        assert_eq!(open_shell("echo oops >&2").unwrap(), "");
    }
}
