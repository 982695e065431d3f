//! A line-oriented calculator engine.
//!
//! Stands in for the real language runtime during bridge testing. It
//! exercises the same seams: it allocates its results on the managed arena,
//! prints through the service surface, distinguishes recoverable errors
//! (reported as text) from unrecoverable ones (returned as faults), and
//! honors the end-of-input convention.

use engine_api::{CycleOutcome, EngineFault, EngineServices, LanguageEngine, ObjRef};

/// Prompt printed before each statement
const PROMPT: &[u8] = b">>> ";

/// End-of-input control byte (Ctrl-D)
const EOT: u8 = 0x04;

/// Evaluates integer `+`/`-` expressions, one per line.
///
/// Each result is formatted into an arena-allocated object and written from
/// there, so every evaluated line pushes on the allocator. Syntax errors are
/// recoverable and reported as text; a line consisting of the single word
/// `raise` simulates an error escaping the engine's propagation machinery.
pub struct CalcEngine {
    line: Vec<u8>,
    results: Vec<ObjRef>,
}

impl CalcEngine {
    pub fn new() -> Self {
        Self {
            line: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Arena references to every result printed so far.
    ///
    /// Kept in engine-private memory, outside the scanned stack span, so a
    /// collection under pressure is free to reclaim old results. The refs
    /// count printed lines; do not dereference them afterwards.
    pub fn results(&self) -> &[ObjRef] {
        &self.results
    }

    fn evaluate(line: &str) -> Result<i64, ()> {
        // Grammar: ['+'|'-'] term (('+'|'-') term)*, an implicit leading
        // zero so "-3" parses. Whitespace separates nothing; it is simply
        // skipped. An operator anywhere else without a term before it
        // ("1++2") is a syntax error, not a zero.
        let mut total: i64 = 0;
        let mut pending_op = b'+';
        let mut term: Option<i64> = None;
        let mut at_start = true;

        for ch in line.bytes() {
            match ch {
                b'0'..=b'9' => {
                    let digit = i64::from(ch - b'0');
                    term = Some(term.unwrap_or(0).wrapping_mul(10).wrapping_add(digit));
                    at_start = false;
                }
                b'+' | b'-' => {
                    if term.is_none() && !at_start {
                        return Err(());
                    }
                    total = Self::apply(total, pending_op, term.unwrap_or(0));
                    pending_op = ch;
                    term = None;
                    at_start = false;
                }
                b' ' | b'\t' => {}
                _ => return Err(()),
            }
        }
        match term {
            Some(value) => Ok(Self::apply(total, pending_op, value)),
            // A trailing operator, or an empty line reaching here
            None => Err(()),
        }
    }

    fn apply(total: i64, op: u8, term: i64) -> i64 {
        if op == b'-' {
            total.wrapping_sub(term)
        } else {
            total.wrapping_add(term)
        }
    }

    /// Formats `value` into a fresh arena object and prints it from there.
    fn emit_result(
        &mut self,
        services: &mut dyn EngineServices,
        value: i64,
    ) -> Result<(), EngineFault> {
        let mut digits = [0u8; 20];
        let text = format_i64(value, &mut digits);

        // Exhaustion after the bridge's own collect-and-retry means the
        // arena genuinely cannot hold the result
        let obj = services.alloc(text.len()).map_err(|_| EngineFault::Fault)?;
        match services.obj_bytes_mut(obj) {
            Some(bytes) => bytes[..text.len()].copy_from_slice(text),
            None => return Err(EngineFault::Fault),
        }
        services.write_obj(obj);
        services.write_text(b"\n");
        self.results.push(obj);
        Ok(())
    }

    fn finish_line(&mut self, services: &mut dyn EngineServices) -> Result<(), EngineFault> {
        let line = core::mem::take(&mut self.line);
        let text = core::str::from_utf8(&line).unwrap_or("");
        let trimmed = text.trim();

        if trimmed.is_empty() {
            services.write_text(PROMPT);
            return Ok(());
        }
        if trimmed == "raise" {
            return Err(EngineFault::PropagationFailure);
        }
        match Self::evaluate(trimmed) {
            Ok(value) => self.emit_result(services, value)?,
            Err(()) => services.write_text(b"error: syntax\n"),
        }
        services.write_text(PROMPT);
        Ok(())
    }
}

impl Default for CalcEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageEngine for CalcEngine {
    fn init(&mut self, services: &mut dyn EngineServices) -> Result<(), EngineFault> {
        self.line.clear();
        self.results.clear();
        services.write_text(PROMPT);
        Ok(())
    }

    fn process_char(
        &mut self,
        services: &mut dyn EngineServices,
        byte: u8,
    ) -> Result<CycleOutcome, EngineFault> {
        match byte {
            EOT => Ok(CycleOutcome::ExitRequested),
            b'\r' => Ok(CycleOutcome::Continue),
            b'\n' => {
                self.finish_line(services)?;
                Ok(CycleOutcome::Continue)
            }
            _ => {
                self.line.push(byte);
                Ok(CycleOutcome::Continue)
            }
        }
    }

    fn deinit(&mut self) {
        self.line.clear();
        self.results.clear();
    }
}

/// Formats a signed integer into `buf`, returning the used prefix.
fn format_i64(value: i64, buf: &mut [u8; 20]) -> &[u8] {
    let mut cursor = buf.len();
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    loop {
        cursor -= 1;
        buf[cursor] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
        if magnitude == 0 {
            break;
        }
    }
    if negative {
        cursor -= 1;
        buf[cursor] = b'-';
    }
    &buf[cursor..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_api::{AllocError, FileError, ImportStat};

    /// Services stub with a bump allocator over a plain byte pool
    struct PoolServices {
        output: Vec<u8>,
        pool: Vec<Vec<u8>>,
    }

    impl PoolServices {
        fn new() -> Self {
            Self {
                output: Vec::new(),
                pool: Vec::new(),
            }
        }

        fn text(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }
    }

    impl EngineServices for PoolServices {
        fn read_char(&mut self) -> Result<u8, EngineFault> {
            Err(EngineFault::Fault)
        }

        fn write_text(&mut self, bytes: &[u8]) {
            self.output.extend_from_slice(bytes);
        }

        fn alloc(&mut self, len: usize) -> Result<ObjRef, AllocError> {
            self.pool.push(vec![0; len]);
            Ok(ObjRef::from_addr(self.pool.len() - 1))
        }

        fn obj_bytes_mut(&mut self, obj: ObjRef) -> Option<&mut [u8]> {
            self.pool.get_mut(obj.addr()).map(Vec::as_mut_slice)
        }

        fn write_obj(&mut self, obj: ObjRef) {
            if let Some(bytes) = self.pool.get(obj.addr()) {
                self.output.extend_from_slice(bytes);
            }
        }

        fn import_stat(&mut self, _path: &str) -> ImportStat {
            ImportStat::NoSuchEntry
        }

        fn open_file(&mut self, _path: &str) -> Result<(), FileError> {
            Err(FileError::NoSuchEntry)
        }

        fn delay_ms(&mut self, _millis: u32) {}

        fn timestamp_ms(&mut self) -> u32 {
            0
        }
    }

    fn feed(engine: &mut CalcEngine, services: &mut PoolServices, script: &[u8]) -> CycleOutcome {
        for &byte in script {
            match engine.process_char(services, byte).unwrap() {
                CycleOutcome::Continue => {}
                CycleOutcome::ExitRequested => return CycleOutcome::ExitRequested,
            }
        }
        CycleOutcome::Continue
    }

    #[test]
    fn test_evaluates_sums_and_differences() {
        assert_eq!(CalcEngine::evaluate("1+1"), Ok(2));
        assert_eq!(CalcEngine::evaluate("10 - 4 + 2"), Ok(8));
        assert_eq!(CalcEngine::evaluate("-3"), Ok(-3));
        assert_eq!(CalcEngine::evaluate("42"), Ok(42));
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert_eq!(CalcEngine::evaluate("1+"), Err(()));
        assert_eq!(CalcEngine::evaluate("one"), Err(()));
        assert_eq!(CalcEngine::evaluate("1*2"), Err(()));
    }

    #[test]
    fn test_rejects_consecutive_operators() {
        // Only the leading position admits a sign; anywhere else an
        // operator needs a completed term before it
        assert_eq!(CalcEngine::evaluate("1++2"), Err(()));
        assert_eq!(CalcEngine::evaluate("1+-2"), Err(()));
        assert_eq!(CalcEngine::evaluate("--3"), Err(()));
        assert_eq!(CalcEngine::evaluate("1 + + 2"), Err(()));
        // The leading sign itself still parses
        assert_eq!(CalcEngine::evaluate("-3+1"), Ok(-2));
        assert_eq!(CalcEngine::evaluate(" +3"), Ok(3));
    }

    #[test]
    fn test_session_prints_prompts_and_results() {
        let mut services = PoolServices::new();
        let mut engine = CalcEngine::new();

        engine.init(&mut services).unwrap();
        let outcome = feed(&mut engine, &mut services, b"1+1\n2-5\n\x04");

        assert_eq!(outcome, CycleOutcome::ExitRequested);
        assert_eq!(services.text(), ">>> 2\n>>> -3\n>>> ");
        assert_eq!(engine.results().len(), 2);
    }

    #[test]
    fn test_syntax_errors_are_recoverable() {
        let mut services = PoolServices::new();
        let mut engine = CalcEngine::new();

        engine.init(&mut services).unwrap();
        feed(&mut engine, &mut services, b"nope\n7\n");

        assert_eq!(services.text(), ">>> error: syntax\n>>> 7\n>>> ");
    }

    #[test]
    fn test_carriage_returns_and_blank_lines_are_tolerated() {
        let mut services = PoolServices::new();
        let mut engine = CalcEngine::new();

        engine.init(&mut services).unwrap();
        feed(&mut engine, &mut services, b"1+1\r\n\n");

        assert_eq!(services.text(), ">>> 2\n>>> >>> ");
    }

    #[test]
    fn test_raise_line_escapes_as_propagation_failure() {
        let mut services = PoolServices::new();
        let mut engine = CalcEngine::new();

        engine.init(&mut services).unwrap();
        feed(&mut engine, &mut services, b"rais");
        assert_eq!(
            engine.process_char(&mut services, b'e'),
            Ok(CycleOutcome::Continue)
        );
        assert_eq!(
            engine.process_char(&mut services, b'\n'),
            Err(EngineFault::PropagationFailure)
        );
    }

    #[test]
    fn test_format_i64_covers_edges() {
        let mut buf = [0u8; 20];
        assert_eq!(format_i64(0, &mut buf), b"0");
        let mut buf = [0u8; 20];
        assert_eq!(format_i64(-7, &mut buf), b"-7");
        let mut buf = [0u8; 20];
        assert_eq!(format_i64(i64::MIN, &mut buf), b"-9223372036854775808");
    }
}
