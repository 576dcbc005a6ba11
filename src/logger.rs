use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn setup(&self, _conduit_id: &str, _size: u64, _is_text: bool) {}
    fn ready(&self, _conduit_id: &str, _chunks: usize) {}
    fn chunk_sent(&self, _conduit_id: &str, _index: usize, _bytes: u64) {}
    fn expired(&self, _conduit_id: &str) {}
    fn error(&self, _context: &str, _msg: &str) {}
    fn done(&self, _chunks: usize, _bytes: u64, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn setup(&self, conduit_id: &str, size: u64, is_text: bool) {
        self.line(&format!("SETUP id={conduit_id} size={size} txt={is_text}"));
    }
    fn ready(&self, conduit_id: &str, chunks: usize) {
        self.line(&format!("READY id={conduit_id} chunks={chunks}"));
    }
    fn chunk_sent(&self, conduit_id: &str, index: usize, bytes: u64) {
        self.line(&format!("CHUNK id={conduit_id} index={index} bytes={bytes}"));
    }
    fn expired(&self, conduit_id: &str) {
        self.line(&format!("EXPIRED id={conduit_id}"));
    }
    fn error(&self, context: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} msg={}", context, msg));
    }
    fn done(&self, chunks: usize, bytes: u64, seconds: f64) {
        self.line(&format!("DONE chunks={chunks} bytes={bytes} seconds={seconds:.3}"));
    }
}
