//! Line-oriented parser for wlr-randr's human-readable output
//!
//! The tool prints one block per output: an unindented header line whose
//! first token is the output name, followed by indented property lines. The
//! `Modes:` property opens a nested zone with one mode per line; the active
//! mode carries a `current` flag in its trailing parenthesised list:
//!
//! ```text
//! Virtual-1 "Red Hat, Inc. QEMU Monitor (Virtual-1)"
//!   Enabled: yes
//!   Modes:
//!     1024x768 px, 60.000000 Hz (preferred, current)
//!     1920x1080 px, 60.000000 Hz
//!   Position: 0,0
//! ```
//!
//! Any deviation from this shape is an error. A misread mode would make us
//! apply a wrong resolution, so nothing is skipped on a best-effort basis.

use thiserror::Error;

use crate::types::DisplayInfo;

/// Grammar violations in wlr-randr output
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RandrParseError {
    #[error("unexpected whitespace on first line of wlr-randr output")]
    IndentedHeader,

    #[error("no active display mode found for output '{output}' (block ends at line {line})")]
    MissingActiveMode { output: String, line: usize },

    #[error("output '{output}' reports more than one active mode (line {line})")]
    MultipleActiveModes { output: String, line: usize },

    #[error("too few fields in mode specification on line {line}")]
    TooFewModeFields { line: usize },
}

/// Mode lines are split into at most this many fields
const MODE_MAX_FIELDS: usize = 5;

/// A mode line with exactly this many fields has no flag list
const MODE_UNFLAGGED_FIELDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// Nothing consumed yet, expecting the first output header
    Header,
    /// Inside an output block, looking for `Modes:`
    SeekingModes,
    /// Inside a block's mode list; `indent` is fixed by its first entry
    InModesZone { indent: Option<usize> },
}

#[derive(Debug)]
struct OutputBlock {
    name: String,
    mode: Option<String>,
}

#[derive(Debug)]
struct RandrParser {
    state: ParserState,
    block: Option<OutputBlock>,
    outputs: Vec<DisplayInfo>,
    last_line: usize,
}

impl RandrParser {
    fn new() -> Self {
        Self {
            state: ParserState::Header,
            block: None,
            outputs: Vec::new(),
            last_line: 0,
        }
    }

    fn feed(&mut self, number: usize, line: &str) -> Result<(), RandrParseError> {
        if line.is_empty() {
            return Ok(());
        }
        self.last_line = number;
        let indent = indentation(line);

        match self.state {
            ParserState::Header => {
                if indent > 0 {
                    return Err(RandrParseError::IndentedHeader);
                }
                self.open_block(line);
            }
            _ if indent == 0 => {
                self.close_block(number)?;
                self.open_block(line);
            }
            _ if is_modes_header(line) => {
                self.state = ParserState::InModesZone { indent: None };
            }
            ParserState::SeekingModes => {}
            ParserState::InModesZone { indent: zone } => {
                let zone_indent = zone.unwrap_or(indent);
                if indent < zone_indent {
                    self.state = ParserState::SeekingModes;
                    return Ok(());
                }
                self.state = ParserState::InModesZone {
                    indent: Some(zone_indent),
                };
                self.read_mode_entry(number, line)?;
            }
        }
        Ok(())
    }

    fn open_block(&mut self, line: &str) {
        let name = line.split_whitespace().next().unwrap_or_default();
        self.block = Some(OutputBlock {
            name: name.to_string(),
            mode: None,
        });
        self.state = ParserState::SeekingModes;
    }

    /// Finish the current block; `line` is where the block ended
    fn close_block(&mut self, line: usize) -> Result<(), RandrParseError> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };
        match block.mode {
            Some(mode) => {
                self.outputs.push(DisplayInfo::new(block.name, mode));
                Ok(())
            }
            None => Err(RandrParseError::MissingActiveMode {
                output: block.name,
                line,
            }),
        }
    }

    fn read_mode_entry(&mut self, number: usize, line: &str) -> Result<(), RandrParseError> {
        let fields = split_fields(line, MODE_MAX_FIELDS);
        if fields.len() < MODE_UNFLAGGED_FIELDS {
            return Err(RandrParseError::TooFewModeFields { line: number });
        }
        if fields.len() == MODE_UNFLAGGED_FIELDS || !has_current_flag(fields[MODE_MAX_FIELDS - 1]) {
            return Ok(());
        }

        let Some(block) = self.block.as_mut() else {
            return Ok(());
        };
        if block.mode.is_some() {
            return Err(RandrParseError::MultipleActiveModes {
                output: block.name.clone(),
                line: number,
            });
        }
        block.mode = Some(fields[0].to_string());
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<DisplayInfo>, RandrParseError> {
        let last_line = self.last_line;
        self.close_block(last_line)?;
        Ok(self.outputs)
    }
}

/// Parse wlr-randr output into one entry per output, in input order
///
/// Returns `Ok(None)` when the output is blank, which is what the compositor
/// prints while it sees no outputs at all.
pub fn parse_outputs(text: &str) -> Result<Option<Vec<DisplayInfo>>, RandrParseError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let mut parser = RandrParser::new();
    for (idx, line) in text.lines().enumerate() {
        parser.feed(idx + 1, line)?;
    }
    parser.finish().map(Some)
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_modes_header(line: &str) -> bool {
    indentation(line) > 0 && line.trim_start() == "Modes:"
}

/// Split on whitespace runs into at most `max` fields; the last keeps the rest
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = line.trim();
    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

/// `current` preceded by `(` or a space and followed by `,` or `)`
fn has_current_flag(flags: &str) -> bool {
    flags.match_indices("current").any(|(start, word)| {
        let before = flags[..start].chars().next_back();
        let after = flags[start + word.len()..].chars().next();
        matches!(before, Some('(' | ' ')) && matches!(after, Some(',' | ')'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_OUTPUT: &str = "\
Virtual-1 \"Red Hat, Inc. QEMU Monitor (Virtual-1)\"
  Make: Red Hat, Inc.
  Model: QEMU Monitor
  Physical size: 0x0 mm
  Enabled: yes
  Modes:
    1024x768 px, 60.000000 Hz (preferred, current)
    1920x1080 px, 60.000000 Hz
    1280x800 px, 59.810001 Hz
  Position: 0,0
  Transform: normal
  Scale: 1.000000
  Adaptive Sync: disabled
";

    const TWO_OUTPUTS: &str = "\
HDMI-A-1 \"Virtual HDMI\"
  Enabled: yes
  Modes:
    1920x1080 px, 60.000000 Hz (preferred)
    1280x720 px, 60.000000 Hz (current)
  Position: 0,0
Virtual-2 \"Secondary\"
  Enabled: yes
  Modes:
    800x600 px, 60.000000 Hz (current)
  Scale: 1.000000
";

    #[test]
    fn test_single_output() {
        let outputs = parse_outputs(SINGLE_OUTPUT).unwrap().unwrap();
        assert_eq!(outputs, vec![DisplayInfo::new("Virtual-1", "1024x768")]);
    }

    #[test]
    fn test_multiple_outputs_keep_input_order() {
        let outputs = parse_outputs(TWO_OUTPUTS).unwrap().unwrap();
        assert_eq!(
            outputs,
            vec![
                DisplayInfo::new("HDMI-A-1", "1280x720"),
                DisplayInfo::new("Virtual-2", "800x600"),
            ]
        );
    }

    #[test]
    fn test_blank_output_means_no_displays() {
        assert_eq!(parse_outputs(""), Ok(None));
        assert_eq!(parse_outputs("\n"), Ok(None));
        assert_eq!(parse_outputs("  \n\t\n"), Ok(None));
    }

    #[test]
    fn test_indented_first_line_is_fatal() {
        let text = "  Virtual-1 \"x\"\n  Modes:\n    1024x768 px, 60.000000 Hz (current)\n";
        assert_eq!(parse_outputs(text), Err(RandrParseError::IndentedHeader));
    }

    #[test]
    fn test_block_without_active_mode_before_next_block_is_fatal() {
        let text = "\
Virtual-1 \"first\"
  Modes:
    1024x768 px, 60.000000 Hz (preferred)
Virtual-2 \"second\"
  Modes:
    800x600 px, 60.000000 Hz (current)
";
        assert_eq!(
            parse_outputs(text),
            Err(RandrParseError::MissingActiveMode {
                output: "Virtual-1".to_string(),
                line: 4,
            })
        );
    }

    #[test]
    fn test_last_block_without_active_mode_is_fatal() {
        let text = "\
Virtual-1 \"first\"
  Modes:
    1024x768 px, 60.000000 Hz (current)
Virtual-2 \"disabled\"
  Enabled: no
";
        assert!(matches!(
            parse_outputs(text),
            Err(RandrParseError::MissingActiveMode { output, .. }) if output == "Virtual-2"
        ));
    }

    #[test]
    fn test_header_only_is_fatal() {
        assert!(matches!(
            parse_outputs("Virtual-1 \"x\"\n"),
            Err(RandrParseError::MissingActiveMode { .. })
        ));
    }

    #[test]
    fn test_four_field_entry_is_never_active() {
        let text = "\
Virtual-1 \"x\"
  Modes:
    1024x768 px, 60.000000 Hz
";
        assert!(matches!(
            parse_outputs(text),
            Err(RandrParseError::MissingActiveMode { .. })
        ));
    }

    #[test]
    fn test_too_few_mode_fields_is_fatal() {
        let text = "\
Virtual-1 \"x\"
  Modes:
    1024x768 px
";
        assert_eq!(
            parse_outputs(text),
            Err(RandrParseError::TooFewModeFields { line: 3 })
        );
    }

    #[test]
    fn test_two_active_modes_is_fatal() {
        let text = "\
Virtual-1 \"x\"
  Modes:
    1024x768 px, 60.000000 Hz (current)
    800x600 px, 60.000000 Hz (current)
";
        assert_eq!(
            parse_outputs(text),
            Err(RandrParseError::MultipleActiveModes {
                output: "Virtual-1".to_string(),
                line: 4,
            })
        );
    }

    #[test]
    fn test_dedent_closes_modes_zone() {
        // "Position" would be a too-short mode entry if the zone stayed open
        let text = "\
Virtual-1 \"x\"
  Modes:
    1024x768 px, 60.000000 Hz (current)
  Position: 0,0
  Transform: normal
";
        let outputs = parse_outputs(text).unwrap().unwrap();
        assert_eq!(outputs, vec![DisplayInfo::new("Virtual-1", "1024x768")]);
    }

    #[test]
    fn test_properties_before_modes_are_ignored() {
        let text = "\
Virtual-1 \"x\"
  Serial: (current)
  Modes:
    640x480 px, 60.000000 Hz (current)
";
        let outputs = parse_outputs(text).unwrap().unwrap();
        assert_eq!(outputs[0].mode, "640x480");
    }

    #[test]
    fn test_current_flag_needs_delimiters() {
        assert!(has_current_flag("(current)"));
        assert!(has_current_flag("(preferred, current)"));
        assert!(has_current_flag("(current, preferred)"));
        assert!(!has_current_flag("(preferred)"));
        assert!(!has_current_flag("(concurrent)"));
        assert!(!has_current_flag("(currently)"));
        assert!(!has_current_flag("current"));
    }

    #[test]
    fn test_split_fields_keeps_remainder() {
        let fields = split_fields("  1024x768 px, 60.000000 Hz (preferred, current)", 5);
        assert_eq!(fields, vec!["1024x768", "px,", "60.000000", "Hz", "(preferred, current)"]);
        assert_eq!(split_fields("a  b", 5), vec!["a", "b"]);
        assert!(split_fields("   ", 5).is_empty());
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let text = "\
Virtual-1 \"x\"
  Modes:
    1024x768 px, 60.000000 Hz (current)
Virtual-1 \"x\"
  Modes:
    800x600 px, 60.000000 Hz (current)
";
        let outputs = parse_outputs(text).unwrap().unwrap();
        assert_eq!(outputs.len(), 2);
    }
}
