// ABOUTME: Transcript file for the log module - open, append formatted lines, close
// ABOUTME: One line per message: time, short sender, tab, body (continuation lines indented)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sender name used for the bot's own lines
pub const BOT_SENDER: &str = "*BOT*";

const TIME_WIDTH: usize = 8;
const SENDER_WIDTH: usize = 12;

/// File name for a transcript id; anything but `[A-Za-z0-9_]` is dropped
pub fn file_name_for(id: &str) -> String {
    let clean: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if clean.is_empty() {
        "quatbot.log".to_string()
    } else {
        format!("quatbot-{clean}.log")
    }
}

/// Format one transcript entry, including the trailing newline.
///
/// The sender is cut at the first ':' (so "@ade:kde.org" becomes "@ade") and
/// to twelve characters.
pub fn format_entry(time: Option<DateTime<Utc>>, sender: &str, body: &str) -> String {
    let time = time
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let short: String = sender
        .split(':')
        .next()
        .unwrap_or_default()
        .chars()
        .take(SENDER_WIDTH)
        .collect();

    let mut out = String::new();
    for (i, part) in body.split('\n').enumerate() {
        if i == 0 {
            out.push_str(&format!(
                "{time:<tw$} {short:<sw$}\t{part}\n",
                tw = TIME_WIDTH,
                sw = SENDER_WIDTH
            ));
        } else {
            out.push_str(&format!(
                "{:tw$} {:sw$}\t{part}\n",
                "",
                "",
                tw = TIME_WIDTH,
                sw = SENDER_WIDTH
            ));
        }
    }
    out
}

/// An optionally-open transcript file in a fixed directory
#[derive(Debug)]
pub struct LogFile {
    dir: PathBuf,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    lines: usize,
}

impl LogFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            path: None,
            writer: None,
            lines: 0,
        }
    }

    /// Open (appending) the transcript for `id`, closing any open one first
    pub fn open(&mut self, id: &str) -> Result<()> {
        self.close();
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(file_name_for(id));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        tracing::info!(path = %path.display(), "Transcript opened");
        self.writer = Some(BufWriter::new(file));
        self.path = Some(path);
        self.lines = 0;
        Ok(())
    }

    pub fn close(&mut self) {
        self.flush();
        if let Some(path) = self.path.take() {
            tracing::info!(path = %path.display(), lines = self.lines, "Transcript closed");
        }
        self.writer = None;
        self.lines = 0;
    }

    /// Add one entry; a no-op while closed
    pub fn append(&mut self, time: Option<DateTime<Utc>>, sender: &str, body: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let entry = format_entry(time, sender, body);
        if let Err(e) = writer.write_all(entry.as_bytes()) {
            tracing::warn!(error = %e, "Failed to write transcript line");
            return;
        }
        self.lines += 1;
        self.flush();
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                tracing::warn!(error = %e, "Failed to flush transcript");
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(file_name_for("notes_2024_07"), "quatbot-notes_2024_07.log");
        assert_eq!(file_name_for("$abc:def/../x"), "quatbot-abcdefx.log");
        assert_eq!(file_name_for(""), "quatbot.log");
        assert_eq!(file_name_for("!!"), "quatbot.log");
    }

    #[test]
    fn test_format_entry() {
        let t = Utc.with_ymd_and_hms(2024, 2, 14, 9, 5, 7).unwrap();
        assert_eq!(
            format_entry(Some(t), "@ade:kde.org", "hello"),
            "09:05:07 @ade        \thello\n"
        );
    }

    #[test]
    fn test_format_entry_bot_and_continuation() {
        let entry = format_entry(None, BOT_SENDER, "one\ntwo");
        let lines: Vec<&str> = entry.lines().collect();
        assert_eq!(lines[0], "         *BOT*       \tone");
        assert_eq!(lines[1], format!("{}\ttwo", " ".repeat(21)));
    }

    #[test]
    fn test_format_entry_truncates_sender() {
        let entry = format_entry(None, "@averyveryverylongname:x.org", "hi");
        assert!(entry.contains("@averyveryve\thi"));
    }

    #[test]
    fn test_open_append_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LogFile::new(dir.path().join("transcripts"));
        assert!(!log.is_open());
        log.append(None, BOT_SENDER, "dropped");

        log.open("notes").unwrap();
        assert!(log.is_open());
        log.append(None, BOT_SENDER, "kept");
        assert_eq!(log.line_count(), 1);
        let path = log.path().unwrap().to_path_buf();
        log.close();
        assert!(!log.is_open());

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("kept"));
        assert!(!text.contains("dropped"));
    }

    #[test]
    fn test_open_failure_leaves_closed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut log = LogFile::new(&blocker);
        assert!(log.open("x").is_err());
        assert!(!log.is_open());
    }
}
