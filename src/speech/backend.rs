use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Result};

use crate::narrate::Language;

/// Text-to-speech backend.
///
/// `speak` renders one sentence and returns once playback finished. It reports
/// failure as `false` and must not panic; the worker logs and moves on.
pub trait SpeechBackend: Send {
    fn name(&self) -> &'static str;

    fn speak(&mut self, text: &str, language: &Language) -> bool;
}

/// Runs an external TTS program per sentence.
///
/// Arguments may contain `{lang}` and `{text}` placeholders. When no argument
/// takes `{text}`, the sentence is written to the program's stdin instead
/// (piper, espeak-ng --stdin, festival --tts).
#[derive(Clone, Debug)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, arg, ...]` list.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("speech command must name a program"))?;
        if program.trim().is_empty() {
            return Err(anyhow!("speech command must name a program"));
        }
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    fn pipes_text(&self) -> bool {
        !self.args.iter().any(|arg| arg.contains("{text}"))
    }
}

impl SpeechBackend for CommandBackend {
    fn name(&self) -> &'static str {
        "command"
    }

    fn speak(&mut self, text: &str, language: &Language) -> bool {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{lang}", language.code()).replace("{text}", text))
            .collect();
        let pipe_text = self.pipes_text();

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(if pipe_text { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                log::warn!("failed to start speech program '{}': {}", self.program, err);
                return false;
            }
        };

        if pipe_text {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(err) = stdin.write_all(text.as_bytes()) {
                    log::warn!("failed to send text to '{}': {}", self.program, err);
                }
            }
        }

        match child.wait() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                log::warn!("speech program '{}' exited with {}", self.program, status);
                false
            }
            Err(err) => {
                log::warn!("speech program '{}' did not finish: {}", self.program, err);
                false
            }
        }
    }
}

/// Backend that only logs. Used when no TTS program is configured.
#[derive(Clone, Debug, Default)]
pub struct LogBackend;

impl SpeechBackend for LogBackend {
    fn name(&self) -> &'static str {
        "log"
    }

    fn speak(&mut self, text: &str, language: &Language) -> bool {
        log::info!("speaking ({}): {}", language, text);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_must_name_program() {
        assert!(CommandBackend::from_argv(&[]).is_err());
        assert!(CommandBackend::from_argv(&[" ".to_string()]).is_err());
    }

    #[test]
    fn missing_program_reports_failure() {
        let mut backend = CommandBackend::new("/nonexistent/percepta-tts", vec![]);
        assert!(!backend.speak("hello", &Language::english()));
    }

    #[cfg(unix)]
    #[test]
    fn text_goes_to_stdin_or_arguments() {
        let en = Language::english();
        let mut piped = CommandBackend::new("sh", vec!["-c".into(), "grep -q Door".into()]);
        assert!(piped.speak("Door ahead.", &en));
        assert!(!piped.speak("Person ahead.", &en));

        let mut inline = CommandBackend::new(
            "sh",
            vec!["-c".into(), "test \"$0\" = en".into(), "{lang}".into(), "{text}".into()],
        );
        assert!(inline.speak("ignored", &en));
    }
}
