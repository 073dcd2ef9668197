//! Payload to text.

use flate2::read::MultiGzDecoder;
use std::io::Read;

use crate::error::EntryError;
use crate::zip::EntryKind;

/// Text of one log file
#[derive(Debug)]
pub struct Decoded {
    pub text: String,
    /// Invalid UTF-8 was replaced with U+FFFD
    pub lossy: bool,
}

/// Turn a member payload into text according to its kind.
///
/// A gzip stream must inflate completely or the entry is rejected; text is
/// never handed out half-decoded.
pub fn decode(path: &str, kind: EntryKind, data: Vec<u8>) -> Result<Decoded, EntryError> {
    let bytes = match kind {
        EntryKind::PlainLog => data,
        EntryKind::GzipLog => gunzip(&data).map_err(|e| EntryError::Unreadable {
            path: path.to_string(),
            reason: format!("gzip: {}", e),
        })?,
        EntryKind::NestedArchive | EntryKind::Other => {
            return Err(EntryError::Unreadable {
                path: path.to_string(),
                reason: format!("{:?} is not a log payload", kind),
            });
        }
    };

    Ok(into_text(bytes))
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    // logrotate can append members to one file; read all of them
    let mut out = Vec::with_capacity(data.len().saturating_mul(4));
    MultiGzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn into_text(bytes: Vec<u8>) -> Decoded {
    match String::from_utf8(bytes) {
        Ok(text) => Decoded { text, lossy: false },
        Err(e) => Decoded {
            text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            lossy: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(text: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_text_passes_through() {
        let decoded = decode("a/a.log", EntryKind::PlainLog, b"hello\n".to_vec()).unwrap();
        assert_eq!(decoded.text, "hello\n");
        assert!(!decoded.lossy);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let decoded = decode("a/a.log", EntryKind::PlainLog, b"ok \xff\xfe done".to_vec()).unwrap();
        assert_eq!(decoded.text, "ok \u{FFFD}\u{FFFD} done");
        assert!(decoded.lossy);
    }

    #[test]
    fn gzip_is_inflated() {
        let decoded = decode("a/a.gz", EntryKind::GzipLog, gzip(b"line 1\nline 2\n")).unwrap();
        assert_eq!(decoded.text, "line 1\nline 2\n");
    }

    #[test]
    fn concatenated_gzip_members() {
        let mut data = gzip(b"first\n");
        data.extend(gzip(b"second\n"));
        let decoded = decode("a/a.gz", EntryKind::GzipLog, data).unwrap();
        assert_eq!(decoded.text, "first\nsecond\n");
    }

    #[test]
    fn broken_gzip_is_an_entry_error() {
        let err = decode("a/a.gz", EntryKind::GzipLog, b"not gzip at all".to_vec()).unwrap_err();
        assert_eq!(err.path(), "a/a.gz");

        let mut truncated = gzip(b"some reasonably long line of text\n");
        truncated.truncate(truncated.len() / 2);
        assert!(decode("a/a.gz", EntryKind::GzipLog, truncated).is_err());
    }
}
