//! Line commands read from stdin

use anyhow::{anyhow, bail, Context, Result};

/// Default overview width in columns
pub const DEFAULT_OVERVIEW_WIDTH: usize = 64;

/// One parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCommand {
    Play { start: usize, end: usize },
    Loop { start: usize, end: usize },
    Pause,
    Stop,
    LoopStart(usize),
    LoopEnd(usize),
    /// Add a cut marker
    Cut(usize),
    /// Remove the marker nearest to a frame
    Uncut(usize),
    /// Play the slice containing a frame
    Slice(usize),
    ListCuts,
    Overview(usize),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play [start end]   play frames once (end 0 = to the end)
  loop [start end]   loop frames (0 keeps the previous boundary)
  pause              toggle pause
  stop               stop playback
  loopstart <f>      set loop start
  loopend <f>        set loop end
  cut <f>            add a cut marker
  uncut <f>          remove the marker nearest to <f>
  slice <f>          play the slice containing <f>
  cuts               list markers and slices
  overview [width]   print a min/max envelope
  quit               exit";

/// Parse a non-empty line
pub fn parse(line: &str) -> Result<LineCommand> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or_else(|| anyhow!("empty command"))?;
    let args = words
        .map(|w| w.parse::<usize>().with_context(|| format!("'{}' is not a frame number", w)))
        .collect::<Result<Vec<_>>>()?;

    let range = |args: &[usize]| match *args {
        [] => Ok((0, 0)),
        [start, end] => Ok((start, end)),
        _ => Err(anyhow!("'{}' takes no arguments or <start> <end>", name)),
    };
    let frame = |args: &[usize]| match *args {
        [frame] => Ok(frame),
        _ => Err(anyhow!("'{}' takes one frame number", name)),
    };
    let none = |args: &[usize]| {
        if args.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("'{}' takes no arguments", name))
        }
    };

    let cmd = match name {
        "play" => {
            let (start, end) = range(&args)?;
            LineCommand::Play { start, end }
        }
        "loop" => {
            let (start, end) = range(&args)?;
            LineCommand::Loop { start, end }
        }
        "pause" => none(&args).map(|_| LineCommand::Pause)?,
        "stop" => none(&args).map(|_| LineCommand::Stop)?,
        "loopstart" => LineCommand::LoopStart(frame(&args)?),
        "loopend" => LineCommand::LoopEnd(frame(&args)?),
        "cut" => LineCommand::Cut(frame(&args)?),
        "uncut" => LineCommand::Uncut(frame(&args)?),
        "slice" => LineCommand::Slice(frame(&args)?),
        "cuts" => none(&args).map(|_| LineCommand::ListCuts)?,
        "overview" => match *args.as_slice() {
            [] => LineCommand::Overview(DEFAULT_OVERVIEW_WIDTH),
            [width] if width > 0 => LineCommand::Overview(width),
            _ => bail!("'overview' takes an optional non-zero width"),
        },
        "help" | "?" => LineCommand::Help,
        "quit" | "exit" | "q" => LineCommand::Quit,
        other => bail!("unknown command '{}', try 'help'", other),
    };
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranges() {
        assert_eq!(parse("play").unwrap(), LineCommand::Play { start: 0, end: 0 });
        assert_eq!(
            parse("  loop 100   200 ").unwrap(),
            LineCommand::Loop { start: 100, end: 200 }
        );
        assert!(parse("play 10").is_err());
        assert!(parse("play 1 2 3").is_err());
    }

    #[test]
    fn test_parse_frames() {
        assert_eq!(parse("loopstart 5").unwrap(), LineCommand::LoopStart(5));
        assert_eq!(parse("cut 44100").unwrap(), LineCommand::Cut(44100));
        assert_eq!(parse("uncut 7").unwrap(), LineCommand::Uncut(7));
        assert_eq!(parse("slice 12").unwrap(), LineCommand::Slice(12));
        assert!(parse("cut").is_err());
        assert!(parse("cut -3").is_err());
    }

    #[test]
    fn test_parse_plain_commands() {
        assert_eq!(parse("pause").unwrap(), LineCommand::Pause);
        assert_eq!(parse("stop").unwrap(), LineCommand::Stop);
        assert_eq!(parse("cuts").unwrap(), LineCommand::ListCuts);
        assert_eq!(parse("q").unwrap(), LineCommand::Quit);
        assert!(parse("stop now").is_err());
        assert!(parse("rewind").is_err());
    }

    #[test]
    fn test_parse_overview() {
        assert_eq!(
            parse("overview").unwrap(),
            LineCommand::Overview(DEFAULT_OVERVIEW_WIDTH)
        );
        assert_eq!(parse("overview 32").unwrap(), LineCommand::Overview(32));
        assert!(parse("overview 0").is_err());
    }
}
