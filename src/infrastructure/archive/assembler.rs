//! Streaming archive assembly.

use std::io::{Seek, Write};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::layout::PrologueEntry;
use super::sink::{SealableSink, SinkSeal};
use crate::domain::entities::{FetchResult, PackageFormat};
use crate::domain::errors::{MdexError, MdexResult};

/// Lifecycle of one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblerState {
    /// Nothing written yet.
    #[default]
    Init,
    /// Comment and prologue entries are written.
    ManifestWritten,
    /// At least one image entry is written.
    StreamingEntries,
    /// The central directory is written and the sink returned.
    Closed,
    /// A failure stopped the archive; the sink holds no valid archive.
    Aborted,
}

impl AssemblerState {
    /// Returns whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }

    /// Returns whether image entries may be appended.
    #[must_use]
    pub const fn accepts_images(&self) -> bool {
        matches!(self, Self::ManifestWritten | Self::StreamingEntries)
    }
}

impl std::fmt::Display for AssemblerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::ManifestWritten => write!(f, "Manifest Written"),
            Self::StreamingEntries => write!(f, "Streaming Entries"),
            Self::Closed => write!(f, "Closed"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Writes one package: the text prologue first, then each image as a
/// stored entry in list order, then the central directory.
///
/// Any failure moves the assembler to [`AssemblerState::Aborted`] and seals
/// the sink; what was written so far is not a valid archive.
pub struct ArchiveAssembler<W: Write + Seek> {
    zip: Option<ZipWriter<SealableSink<W>>>,
    seal: SinkSeal,
    format: PackageFormat,
    state: AssemblerState,
    next_index: usize,
}

impl<W: Write + Seek> std::fmt::Debug for ArchiveAssembler<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveAssembler")
            .field("format", &self.format)
            .field("state", &self.state)
            .field("next_index", &self.next_index)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Seek> ArchiveAssembler<W> {
    /// Creates an assembler writing a `format` package into `sink`.
    #[must_use]
    pub fn new(sink: W, format: PackageFormat) -> Self {
        let (sink, seal) = SealableSink::new(sink);
        Self {
            zip: Some(ZipWriter::new(sink)),
            seal,
            format,
            state: AssemblerState::Init,
            next_index: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Sets the archive comment and writes the prologue entries in order.
    ///
    /// # Errors
    /// Returns error if called twice or if an entry cannot be written.
    pub fn write_manifest(&mut self, comment: &str, entries: &[PrologueEntry]) -> MdexResult<()> {
        if self.state != AssemblerState::Init {
            return Err(self.misuse("write manifest"));
        }

        let written = self.with_zip(|zip| {
            zip.set_comment(comment);
            for entry in entries {
                let method = if entry.compressed {
                    CompressionMethod::Deflated
                } else {
                    CompressionMethod::Stored
                };
                zip.start_file(
                    entry.name.as_str(),
                    SimpleFileOptions::default().compression_method(method),
                )?;
                zip.write_all(entry.body.as_bytes())?;
                debug!(entry = %entry.name, "Wrote prologue entry");
            }
            Ok(())
        });

        written.map_err(|e| self.abort(e))?;
        self.state = AssemblerState::ManifestWritten;
        Ok(())
    }

    /// Appends the next image. A failed result aborts the archive and
    /// returns its error.
    ///
    /// # Errors
    /// Returns the result's error, an out-of-order error, or a write error.
    pub fn append(&mut self, result: FetchResult) -> MdexResult<()> {
        if !self.state.accepts_images() {
            return Err(self.misuse("append image"));
        }

        let bytes = match result.payload {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.abort(err)),
        };

        if result.index != self.next_index {
            let err = MdexError::archive(format!(
                "image {} arrived while expecting image {}",
                result.index, self.next_index
            ));
            return Err(self.abort(err));
        }

        let name = self.format.image_entry_name(&result.name);
        let written = self.with_zip(|zip| {
            zip.start_file(
                name.as_str(),
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            )?;
            zip.write_all(&bytes)?;
            Ok(())
        });
        written.map_err(|e| self.abort(e))?;

        debug!(index = result.index, entry = %name, size = bytes.len(), "Wrote image entry");
        self.next_index += 1;
        self.state = AssemblerState::StreamingEntries;
        Ok(())
    }

    /// Finalizes the archive once `expected` images have been written and
    /// returns the sink.
    ///
    /// # Errors
    /// Returns error if images are missing or the directory cannot be written.
    pub fn finish(&mut self, expected: usize) -> MdexResult<W> {
        if !self.state.accepts_images() {
            return Err(self.misuse("finish"));
        }
        if self.next_index != expected {
            let err = MdexError::archive(format!(
                "archive has {} of {expected} images",
                self.next_index
            ));
            return Err(self.abort(err));
        }

        let Some(zip) = self.zip.take() else {
            return Err(self.misuse("finish"));
        };
        let sink = zip.finish().map_err(|e| self.abort(e.into()))?;

        self.state = AssemblerState::Closed;
        info!(format = %self.format, images = expected, "Archive closed");
        Ok(sink.into_inner())
    }

    /// Moves to [`AssemblerState::Aborted`] and seals the sink.
    pub fn abort(&mut self, err: MdexError) -> MdexError {
        if !self.state.is_terminal() {
            warn!(state = %self.state, error = %err, "Aborting archive");
            self.state = AssemblerState::Aborted;
        }
        self.seal.seal();
        self.zip = None;
        err
    }

    fn with_zip<F>(&mut self, f: F) -> MdexResult<()>
    where
        F: FnOnce(&mut ZipWriter<SealableSink<W>>) -> MdexResult<()>,
    {
        match self.zip.as_mut() {
            Some(zip) => f(zip),
            None => Err(MdexError::archive("archive writer is gone")),
        }
    }

    fn misuse(&self, action: &str) -> MdexError {
        MdexError::archive(format!("cannot {action} in state {}", self.state))
    }
}

impl<W: Write + Seek> Drop for ArchiveAssembler<W> {
    fn drop(&mut self) {
        if self.zip.is_some() {
            self.seal.seal();
        }
    }
}

/// Drives an assembler from a result channel on a blocking thread.
///
/// The prologue is written before the first image is received. The channel
/// must deliver `expected` results in list order.
///
/// # Errors
/// Returns the first error of the fetch stream or of the archive itself.
pub async fn assemble<W>(
    sink: W,
    format: PackageFormat,
    comment: String,
    prologue: Vec<PrologueEntry>,
    expected: usize,
    mut results: mpsc::Receiver<FetchResult>,
) -> MdexResult<W>
where
    W: Write + Seek + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut assembler = ArchiveAssembler::new(sink, format);
        assembler.write_manifest(&comment, &prologue)?;

        while let Some(result) = results.blocking_recv() {
            assembler.append(result)?;
        }

        assembler.finish(expected)
    })
    .await
    .map_err(|e| MdexError::archive(format!("assembler task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::io::{Cursor, Read, SeekFrom};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    /// Cursor whose buffer stays readable after the assembler drops it.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl SharedBuffer {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().get_ref().clone()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for SharedBuffer {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.0.lock().seek(pos)
        }
    }

    fn manifest() -> Vec<PrologueEntry> {
        vec![PrologueEntry {
            name: "ComicInfo.xml".to_string(),
            body: "<ComicInfo/>".to_string(),
            compressed: true,
        }]
    }

    fn image(index: usize) -> FetchResult {
        FetchResult {
            index,
            name: format!("{index}.png"),
            payload: Ok(Bytes::from(vec![index as u8; 64])),
        }
    }

    fn failed(index: usize) -> FetchResult {
        FetchResult {
            index,
            name: format!("{index}.png"),
            payload: Err(MdexError::partial_fetch(index, MdexError::upstream("404 Not Found"))),
        }
    }

    fn read_names(bytes: Vec<u8>) -> (Vec<String>, Vec<CompressionMethod>, String) {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let comment = String::from_utf8(archive.comment().to_vec()).unwrap();
        let mut names = Vec::new();
        let mut methods = Vec::new();
        for i in 0..archive.len() {
            let file = archive.by_index(i).unwrap();
            names.push(file.name().to_string());
            methods.push(file.compression());
        }
        (names, methods, comment)
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut assembler = ArchiveAssembler::new(Cursor::new(Vec::new()), PackageFormat::Cbz);
        assert_eq!(assembler.state(), AssemblerState::Init);

        assembler
            .write_manifest("Frieren Ch. 1", &manifest())
            .unwrap();
        assert_eq!(assembler.state(), AssemblerState::ManifestWritten);

        assembler.append(image(0)).unwrap();
        assembler.append(image(1)).unwrap();
        assert_eq!(assembler.state(), AssemblerState::StreamingEntries);

        let sink = assembler.finish(2).unwrap();
        assert_eq!(assembler.state(), AssemblerState::Closed);

        let (names, methods, comment) = read_names(sink.into_inner());
        assert_eq!(names, vec!["ComicInfo.xml", "0.png", "1.png"]);
        assert_eq!(
            methods,
            vec![
                CompressionMethod::Deflated,
                CompressionMethod::Stored,
                CompressionMethod::Stored
            ]
        );
        assert_eq!(comment, "Frieren Ch. 1");
    }

    #[test]
    fn test_epub_images_live_under_oebps() {
        let mut assembler = ArchiveAssembler::new(Cursor::new(Vec::new()), PackageFormat::Epub);
        assembler.write_manifest("t", &[]).unwrap();
        assembler.append(image(0)).unwrap();
        let sink = assembler.finish(1).unwrap();

        let (names, _, _) = read_names(sink.into_inner());
        assert_eq!(names, vec!["OEBPS/Images/0.png"]);
    }

    #[test]
    fn test_stored_image_bytes_round_trip() {
        let mut assembler = ArchiveAssembler::new(Cursor::new(Vec::new()), PackageFormat::Cbz);
        assembler.write_manifest("t", &manifest()).unwrap();
        assembler.append(image(0)).unwrap();
        let sink = assembler.finish(1).unwrap();

        let mut archive = assert_ok!(zip::ZipArchive::new(Cursor::new(sink.into_inner())));
        let mut body = Vec::new();
        archive
            .by_name("0.png")
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, vec![0u8; 64]);
    }

    #[test]
    fn test_failed_result_aborts_without_archive() {
        let buffer = SharedBuffer::default();
        let mut assembler = ArchiveAssembler::new(buffer.clone(), PackageFormat::Cbz);
        assembler.write_manifest("t", &manifest()).unwrap();
        assembler.append(image(0)).unwrap();

        let err = assembler.append(failed(1)).unwrap_err();
        assert!(matches!(err, MdexError::PartialFetch { index: 1, .. }));
        assert_eq!(assembler.state(), AssemblerState::Aborted);

        assert!(assembler.append(image(1)).is_err());
        assert!(assembler.finish(2).is_err());
        drop(assembler);

        assert!(zip::ZipArchive::new(Cursor::new(buffer.bytes())).is_err());
    }

    #[test]
    fn test_out_of_order_image_aborts() {
        let mut assembler = ArchiveAssembler::new(Cursor::new(Vec::new()), PackageFormat::Cbz);
        assembler.write_manifest("t", &manifest()).unwrap();

        let err = assembler.append(image(1)).unwrap_err();
        assert!(matches!(err, MdexError::Archive { .. }));
        assert_eq!(assembler.state(), AssemblerState::Aborted);
    }

    #[test]
    fn test_images_before_manifest_rejected() {
        let mut assembler = ArchiveAssembler::new(Cursor::new(Vec::new()), PackageFormat::Cbz);
        assert!(assembler.append(image(0)).is_err());
        assert_eq!(assembler.state(), AssemblerState::Init);
    }

    #[test]
    fn test_missing_images_abort_on_finish() {
        let mut assembler = ArchiveAssembler::new(Cursor::new(Vec::new()), PackageFormat::Cbz);
        assembler.write_manifest("t", &manifest()).unwrap();
        assembler.append(image(0)).unwrap();

        assert!(assembler.finish(3).is_err());
        assert_eq!(assembler.state(), AssemblerState::Aborted);
    }

    #[tokio::test]
    async fn test_assemble_drains_channel() {
        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(async move {
            for i in 0..3 {
                tx.send(image(i)).await.unwrap();
            }
        });

        let sink = assert_ok!(
            assemble(
                Cursor::new(Vec::new()),
                PackageFormat::Cbz,
                "t".to_string(),
                manifest(),
                3,
                rx
            )
            .await
        );

        let (names, _, _) = read_names(sink.into_inner());
        assert_eq!(names, vec!["ComicInfo.xml", "0.png", "1.png", "2.png"]);
    }

    #[tokio::test]
    async fn test_assemble_surfaces_stream_error() {
        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(async move {
            let _ = tx.send(image(0)).await;
            let _ = tx.send(failed(1)).await;
        });

        let err = assert_err!(
            assemble(
                Cursor::new(Vec::new()),
                PackageFormat::Cbz,
                "t".to_string(),
                manifest(),
                3,
                rx
            )
            .await
        );
        assert!(err.is_upstream());
    }
}
