//! I/O handling: console and the bound binary file

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};
use crate::memory::Memory;

/// Value `consoleRead` yields when nothing can be read
pub const NO_INPUT: i64 = -1;

/// Console endpoint for `consoleRead`/`consoleWrite`
///
/// Values are hexadecimal on stdin/stdout unless captured channels are
/// attached.
#[derive(Debug, Clone, Default)]
pub struct Console {
    input: Option<VecDeque<i64>>,
    output: Option<Vec<i64>>,
    /// Tokens left over from the last line read from stdin
    pending: VecDeque<String>,
}

impl Console {
    pub fn new(input: Option<Vec<i64>>, capture_output: bool) -> Self {
        Self {
            input: input.map(VecDeque::from),
            output: capture_output.then(Vec::new),
            pending: VecDeque::new(),
        }
    }

    pub fn read(&mut self) -> i64 {
        if let Some(input) = &mut self.input {
            return input.pop_front().unwrap_or(NO_INPUT);
        }

        self.read_from(&mut io::stdin().lock())
    }

    /// Next whitespace-separated hex value from `reader`
    pub fn read_from(&mut self, reader: &mut impl BufRead) -> i64 {
        while self.pending.is_empty() {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => return NO_INPUT,
                Ok(_) => self
                    .pending
                    .extend(line.split_whitespace().map(str::to_owned)),
                Err(err) => {
                    warn!(error = %err, "console read failed");
                    return NO_INPUT;
                }
            }
        }

        let Some(token) = self.pending.pop_front() else {
            return NO_INPUT;
        };
        parse_hex(&token).unwrap_or_else(|| {
            warn!(input = %token, "malformed console input");
            NO_INPUT
        })
    }

    pub fn write(&mut self, value: i64) -> Result<()> {
        if let Some(output) = &mut self.output {
            output.push(value);
            return Ok(());
        }

        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{:016x}", value as u64)?;
        stdout.flush()?;
        Ok(())
    }

    /// Captured output, if capture is enabled
    pub fn output(&self) -> Option<&[i64]> {
        self.output.as_deref()
    }
}

/// Parse a hexadecimal console value, with or without `0x`
pub fn parse_hex(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);

    let magnitude = u64::from_str_radix(digits, 16).ok()? as i64;
    Some(if negative { magnitude.wrapping_neg() } else { magnitude })
}

/// Random-access file behind the `read`/`write` opcodes
#[derive(Debug, Default)]
pub struct BinaryFile {
    file: Option<File>,
}

impl BinaryFile {
    /// A file that is not open: reads transfer nothing, writes are dropped
    pub fn closed() -> Self {
        Self::default()
    }

    /// Open `path` for reading and writing, creating it if absent
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        debug!(path = %path.display(), "binary file opened");
        Ok(Self { file: Some(file) })
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Copy up to `count` bytes at file `offset` into memory at `address`.
    ///
    /// Returns the number of bytes transferred: 0 when the file is closed,
    /// `count` is not positive or `offset` is at or past the end of the file,
    /// and the bytes remaining from `offset` when the range straddles the end.
    pub fn read(&mut self, offset: i64, count: i64, memory: &Memory, address: i64) -> Result<i64> {
        let Some(file) = &mut self.file else {
            return Ok(0);
        };
        let (Ok(offset), Ok(count)) = (u64::try_from(offset), u64::try_from(count)) else {
            return Ok(0);
        };
        if count == 0 {
            return Ok(0);
        }

        let size = file.metadata()?.len();
        if offset >= size {
            return Ok(0);
        }
        let count = count.min(size - offset) as usize;
        memory.check(address, count)?;

        let mut buffer = vec![0u8; count];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buffer)?;
        memory.write_bytes(address, &buffer)?;

        Ok(count as i64)
    }

    /// Copy `count` bytes from memory at `address` to file `offset`,
    /// zero-extending the file first if `offset` is past its end
    pub fn write(&mut self, offset: i64, count: i64, memory: &Memory, address: i64) -> Result<()> {
        let Some(file) = &mut self.file else {
            return Ok(());
        };
        let offset = u64::try_from(offset).map_err(|_| RuntimeError::FileOffset { offset })?;
        let count = usize::try_from(count).unwrap_or(0);
        let data = memory.read_bytes(address, count)?;

        let size = file.metadata()?.len();
        if offset > size {
            file.set_len(offset)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&data)?;
        Ok(())
    }

    /// Flush and close the file
    pub fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
            debug!("binary file closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    #[test]
    fn test_captured_console() {
        let mut console = Console::new(Some(vec![5, -2]), true);
        assert_eq!(console.read(), 5);
        assert_eq!(console.read(), -2);
        assert_eq!(console.read(), NO_INPUT);

        console.write(0x10).unwrap();
        console.write(-1).unwrap();
        assert_eq!(console.output(), Some(&[0x10, -1][..]));
    }

    #[test]
    fn test_read_splits_tokens_across_calls() {
        let mut console = Console::new(None, false);
        let mut input = Cursor::new("3 4\n\n  ff\tzz 0x10\n");
        assert_eq!(console.read_from(&mut input), 3);
        assert_eq!(console.read_from(&mut input), 4);
        assert_eq!(console.read_from(&mut input), 0xff);
        assert_eq!(console.read_from(&mut input), NO_INPUT);
        assert_eq!(console.read_from(&mut input), 0x10);
        assert_eq!(console.read_from(&mut input), NO_INPUT);
    }

    #[test]
    fn test_uncaptured_output_is_none() {
        assert_eq!(Console::new(None, false).output(), None);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("ff\n"), Some(255));
        assert_eq!(parse_hex("0x10"), Some(16));
        assert_eq!(parse_hex("  00000000000000FF  "), Some(255));
        assert_eq!(parse_hex("ffffffffffffffff"), Some(-1));
        assert_eq!(parse_hex("-a"), Some(-10));
        assert_eq!(parse_hex("xyz"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn test_closed_file() {
        let memory = Memory::new(8);
        let mut file = BinaryFile::closed();
        assert!(!file.is_open());
        assert_eq!(file.read(0, 8, &memory, 0).unwrap(), 0);
        file.write(0, 8, &memory, 0).unwrap();
        file.close().unwrap();
    }

    #[test]
    fn test_write_then_read() {
        let temp = NamedTempFile::new().unwrap();
        let memory = Memory::from_image(vec![1, 2, 3, 4, 0, 0, 0, 0]);
        let mut file = BinaryFile::open(temp.path()).unwrap();

        file.write(0, 4, &memory, 0).unwrap();
        assert_eq!(file.read(1, 2, &memory, 4).unwrap(), 2);
        assert_eq!(memory.snapshot(), vec![1, 2, 3, 4, 2, 3, 0, 0]);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let temp = NamedTempFile::new().unwrap();
        let memory = Memory::from_image(vec![0xAA, 0xBB]);
        let mut file = BinaryFile::open(temp.path()).unwrap();

        file.write(5, 2, &memory, 0).unwrap();
        file.close().unwrap();

        let contents = std::fs::read(temp.path()).unwrap();
        assert_eq!(contents, vec![0, 0, 0, 0, 0, 0xAA, 0xBB]);
    }

    #[test]
    fn test_read_clamps_at_end_of_file() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), [1, 2, 3, 4, 5, 6]).unwrap();
        let memory = Memory::new(16);
        let mut file = BinaryFile::open(temp.path()).unwrap();

        assert_eq!(file.read(4, 10, &memory, 0).unwrap(), 2);
        assert_eq!(memory.read_bytes(0, 3).unwrap(), vec![5, 6, 0]);
        assert_eq!(file.read(6, 1, &memory, 0).unwrap(), 0);
        assert_eq!(file.read(100, 1, &memory, 0).unwrap(), 0);
        assert_eq!(file.read(0, 0, &memory, 0).unwrap(), 0);
        assert_eq!(file.read(-1, 4, &memory, 0).unwrap(), 0);
    }

    #[test]
    fn test_read_checks_memory_range() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), [7; 8]).unwrap();
        let memory = Memory::new(4);
        let mut file = BinaryFile::open(temp.path()).unwrap();

        assert!(matches!(
            file.read(0, 8, &memory, 0),
            Err(RuntimeError::MemoryRange { .. })
        ));
        assert_eq!(memory.snapshot(), vec![0; 4]);
    }

    #[test]
    fn test_write_rejects_negative_offset() {
        let temp = NamedTempFile::new().unwrap();
        let memory = Memory::new(4);
        let mut file = BinaryFile::open(temp.path()).unwrap();
        assert!(matches!(
            file.write(-3, 1, &memory, 0),
            Err(RuntimeError::FileOffset { offset: -3 })
        ));
    }

    #[test]
    fn test_open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.bin");
        let mut file = BinaryFile::open(&path).unwrap();
        assert!(file.is_open());
        file.close().unwrap();
        assert!(path.exists());
    }
}
