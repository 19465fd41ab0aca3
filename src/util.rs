use std::{cell::RefCell, io::Write};

#[derive(Copy, Clone, Debug)]
pub(crate) enum ErrorCode {
    Write,
    Flush,
    Poison,
}

// Reports a problem that cannot be returned to the caller.
pub(crate) fn eprint_err(error_code: ErrorCode, msg: &str, err: &dyn std::error::Error) {
    eprintln!("[levlog][ERRCODE::{error_code:?}] {msg}, caused by {err:?}");
}

// Thread-local buffer
pub(crate) fn buffer_with<F>(f: F)
where
    F: FnOnce(&RefCell<Vec<u8>>),
{
    thread_local! {
        static BUFFER: RefCell<Vec<u8>> = RefCell::new(Vec::with_capacity(200));
    }
    BUFFER.with(f);
}

// Assembles prefix, line and newline in the thread-local buffer
// and hands them to the writer with a single write_all.
pub(crate) fn write_line(prefix: &str, line: &str, w: &mut dyn Write) -> std::io::Result<()> {
    let mut result: std::io::Result<()> = Ok(());

    buffer_with(|tl_buf| match tl_buf.try_borrow_mut() {
        Ok(mut buffer) => {
            assemble(&mut buffer, prefix, line);
            result = w.write_all(&buffer);
            buffer.clear();
        }
        Err(_e) => {
            // We arrive here in the rare cases of recursive logging
            // (e.g. log calls in Display implementations of logged values)
            let mut tmp_buf = Vec::<u8>::with_capacity(200);
            assemble(&mut tmp_buf, prefix, line);
            result = w.write_all(&tmp_buf);
        }
    });
    result
}

fn assemble(buffer: &mut Vec<u8>, prefix: &str, line: &str) {
    buffer.extend_from_slice(prefix.as_bytes());
    buffer.extend_from_slice(line.as_bytes());
    buffer.push(b'\n');
}
