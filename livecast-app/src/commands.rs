//! Console commands.

use std::str::FromStr;

use livecast_ipc::RotationAngle;

/// A command typed at the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch the live toggle on.
    On,
    /// Switch the live toggle off.
    Off,
    /// Turn the device.
    Rotate(RotationAngle),
    /// Simulate the remote end closing the stream.
    Drop,
    /// Print the current state.
    Status,
    /// Exit.
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();

        let parsed = match command.as_str() {
            "on" => Self::On,
            "off" => Self::Off,
            "drop" => Self::Drop,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            "rotate" => {
                let degrees = words
                    .next()
                    .ok_or_else(|| "usage: rotate <degrees>".to_string())?;
                let degrees: i32 = degrees
                    .parse()
                    .map_err(|_| format!("not a number: {degrees}"))?;
                Self::Rotate(RotationAngle::from_degrees(degrees))
            }
            "" => return Err("empty command".to_string()),
            other => return Err(format!("unknown command: {other}")),
        };

        match words.next() {
            Some(extra) => Err(format!("unexpected argument: {extra}")),
            None => Ok(parsed),
        }
    }
}

/// One-line help.
pub const HELP: &str = "commands: on | off | rotate <deg> | drop | status | quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("on".parse(), Ok(Command::On));
        assert_eq!(" OFF ".parse(), Ok(Command::Off));
        assert_eq!(
            "rotate -90".parse(),
            Ok(Command::Rotate(RotationAngle::Deg270))
        );
        assert_eq!("quit".parse(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("rotate".parse::<Command>().is_err());
        assert!("rotate left".parse::<Command>().is_err());
        assert!("on now".parse::<Command>().is_err());
        assert!("jump".parse::<Command>().is_err());
    }
}
