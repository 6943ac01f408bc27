use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;

use super::book::Book;
use super::xml::Document;
use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Load a GnuCash XML book, compressed or not.
pub fn load(path: &Path) -> Result<Book> {
    log::info!("Loading ledger {}...", path.display());

    let raw = std::fs::read(path)?;
    let content = if raw.starts_with(&GZIP_MAGIC) {
        let mut content = String::new();
        GzDecoder::new(raw.as_slice()).read_to_string(&mut content)?;
        content
    } else {
        String::from_utf8(raw).map_err(|err| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })?
    };
    let book = Book::from_document(Document::parse(&content)?)?;

    log::info!(
        "Loading ledger...done ({} accounts, {} transactions)",
        book.accounts.len(),
        book.transactions.len(),
    );

    Ok(book)
}

/// Write the book as uncompressed XML.
pub fn save(book: &Book, path: &Path, pretty: bool) -> Result<()> {
    log::info!("Writing resulting ledger {}...", path.display());

    let content = book.to_document().to_bytes(pretty)?;

    // First write to temporary file so we don't clobber the output if writing fails halfway
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Path has no valid filename: {}", path.display()),
            ))
        })?;
    let tmppath = path.with_file_name(format!("{}.temp", filename));
    std::fs::write(&tmppath, content)?;

    // Ok, writing succeeded, let's now replace the real file with the tmpfile
    std::fs::rename(&tmppath, path)?;

    log::info!("Writing resulting ledger...done");

    Ok(())
}

#[cfg(test)]
mod tests {
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    use super::*;
    use crate::ledger::book::testutils::SAMPLE_BOOK;

    #[test]
    fn load_uncompressed() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("book.gnucash");
        std::fs::write(&path, SAMPLE_BOOK).unwrap();

        let book = load(&path).unwrap();
        assert_eq!(8, book.accounts.len());
        assert_eq!(1, book.transactions.len());
    }

    #[test]
    fn load_compressed() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("book.gnucash");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE_BOOK.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let book = load(&path).unwrap();
        assert_eq!(8, book.accounts.len());
        assert_eq!("Opening donation", book.transactions[0].description);
    }

    #[test]
    fn load_nonexisting() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("missing.gnucash");
        assert!(matches!(load(&path), Err(Error::Io(_))));
    }

    #[test]
    fn save_and_load() {
        let tempdir = tempfile::tempdir().unwrap();
        let input = tempdir.path().join("in.gnucash");
        let output = tempdir.path().join("out.gnucash");
        std::fs::write(&input, SAMPLE_BOOK).unwrap();

        for pretty in [false, true] {
            let mut book = load(&input).unwrap();
            book.transactions.clear();
            save(&book, &output, pretty).unwrap();

            let reloaded = load(&output).unwrap();
            assert_eq!(book.accounts, reloaded.accounts);
            assert!(reloaded.transactions.is_empty());
            assert!(!tempdir.path().join("out.gnucash.temp").exists());
        }
    }
}
