use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};

pub fn strbool(value: &str) -> bool {
    ["true", "True", "t", "T", "1"].contains(&value)
}

pub fn md5_bytes(content: &[u8]) -> String {
    format!("{:x}", md5::compute(content))
}

pub fn md5_file(file_path: &Path) -> Result<String> {
    let f = File::open(file_path)
        .context(format!("Open file {} for hashing", file_path.display()))?;
    let len = f.metadata()?.len();
    // 1MB buffer is enough, bigger files are hashed by chunk
    let buf_len = len.min(1_000_000) as usize;
    let mut buf = BufReader::with_capacity(buf_len.max(1), f);
    let mut context = md5::Context::new();
    loop {
        let part = buf.fill_buf()?;
        if part.is_empty() {
            break;
        }
        context.consume(part);
        let part_len = part.len();
        buf.consume(part_len);
    }
    Ok(format!("{:x}", context.compute()))
}
