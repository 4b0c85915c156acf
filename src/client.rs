//! Single-file read/write operations against ExifTool.

use crate::decoder;
use crate::error::{MetaError, MetaResult};
use crate::invoker::{SystemRunner, ToolInvoker, ToolRunner};
use crate::tag::{TagEntry, TagRef};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// How the tool treats the original file when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Tool default: keep `<name>_original` next to the file.
    #[default]
    KeepBackup,
    Overwrite,
    OverwriteInPlace,
}

impl WriteMode {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::KeepBackup
        }
    }

    fn flag(self) -> Option<&'static str> {
        match self {
            Self::KeepBackup => None,
            Self::Overwrite => Some("-overwrite_original"),
            Self::OverwriteInPlace => Some("-overwrite_original_in_place"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing was modified; the tool was not invoked.
    Unchanged,
    /// The tool ran; `message` is its trimmed stdout.
    Updated { message: String },
}

/// Read/write entry point used by UI callers and the batch executor.
///
/// Reloading after a write is the caller's job.
#[derive(Debug, Clone)]
pub struct ExifToolClient<R = SystemRunner> {
    invoker: ToolInvoker<R>,
}

impl ExifToolClient<SystemRunner> {
    pub fn new(tool_path: impl Into<PathBuf>) -> Self {
        Self::from_invoker(ToolInvoker::new(tool_path))
    }
}

impl<R: ToolRunner> ExifToolClient<R> {
    pub fn from_invoker(invoker: ToolInvoker<R>) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &ToolInvoker<R> {
        &self.invoker
    }

    pub fn version(&self) -> MetaResult<String> {
        self.invoker.version()
    }

    pub fn load_metadata(&self, path: &Path) -> MetaResult<Vec<TagEntry>> {
        ensure_exists(path)?;
        let args = vec![
            OsString::from("-json"),
            OsString::from("-G"),
            OsString::from("-a"),
            path_arg(path),
        ];
        let stdout = self.invoker.execute(&args)?;
        let entries = decoder::decode(&stdout)?;
        log::info!("Loaded {} tags from {}", entries.len(), path.display());
        Ok(entries)
    }

    /// Writes every modified entry in one invocation. An empty value deletes
    /// the tag.
    pub fn save_metadata(
        &self,
        path: &Path,
        entries: &[TagEntry],
        mode: WriteMode,
    ) -> MetaResult<WriteOutcome> {
        let modified: Vec<&TagEntry> = entries.iter().filter(|entry| entry.is_modified()).collect();
        if modified.is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }
        if let Some(protected) = modified.iter().find(|entry| !entry.is_writable) {
            return Err(MetaError::WriteProtected(protected.qualified_name()));
        }
        ensure_exists(path)?;

        let mut args: Vec<OsString> = modified
            .iter()
            .map(|entry| assignment(&entry.qualified_name(), &entry.value))
            .collect();
        push_mode(&mut args, mode);
        args.push(path_arg(path));

        log::info!("Writing {} tags to {}", modified.len(), path.display());
        self.run_write(&args)
    }

    pub fn strip_all(&self, path: &Path, mode: WriteMode) -> MetaResult<WriteOutcome> {
        ensure_exists(path)?;
        let mut args = vec![OsString::from("-all=")];
        push_mode(&mut args, mode);
        args.push(path_arg(path));

        log::info!("Stripping all metadata from {}", path.display());
        self.run_write(&args)
    }

    /// Restores from the tool's `_original` backup. A missing backup is
    /// reported by the tool itself.
    pub fn restore_original(&self, path: &Path) -> MetaResult<WriteOutcome> {
        ensure_exists(path)?;
        let args = vec![OsString::from("-restore_original"), path_arg(path)];

        log::info!("Restoring original metadata for {}", path.display());
        self.run_write(&args)
    }

    pub fn add_tag(
        &self,
        path: &Path,
        tag_ref: &str,
        value: &str,
        mode: WriteMode,
    ) -> MetaResult<WriteOutcome> {
        let tag = TagRef::parse(tag_ref)?;
        self.set_tags(path, &[(tag, value.to_string())], mode)
    }

    /// Sets several tags in one invocation; read-only tags are rejected
    /// before the tool runs.
    pub fn set_tags(
        &self,
        path: &Path,
        tags: &[(TagRef, String)],
        mode: WriteMode,
    ) -> MetaResult<WriteOutcome> {
        if tags.is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }
        if let Some((protected, _)) = tags.iter().find(|(tag, _)| !tag.is_writable()) {
            return Err(MetaError::WriteProtected(protected.qualified_name()));
        }
        ensure_exists(path)?;

        let mut args: Vec<OsString> = tags
            .iter()
            .map(|(tag, value)| assignment(&tag.qualified_name(), value))
            .collect();
        push_mode(&mut args, mode);
        args.push(path_arg(path));

        log::info!("Setting {} tags on {}", tags.len(), path.display());
        self.run_write(&args)
    }

    pub fn copy_tags(
        &self,
        source: &Path,
        destination: &Path,
        mode: WriteMode,
    ) -> MetaResult<WriteOutcome> {
        ensure_exists(source)?;
        ensure_exists(destination)?;
        let mut args = vec![
            OsString::from("-tagsFromFile"),
            path_arg(source),
            OsString::from("-all:all"),
        ];
        push_mode(&mut args, mode);
        args.push(path_arg(destination));

        log::info!(
            "Copying tags from {} to {}",
            source.display(),
            destination.display()
        );
        self.run_write(&args)
    }

    fn run_write(&self, args: &[OsString]) -> MetaResult<WriteOutcome> {
        let message = self.invoker.execute_text(args)?;
        Ok(WriteOutcome::Updated { message })
    }
}

fn ensure_exists(path: &Path) -> MetaResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(MetaError::FileNotFound(path.to_path_buf()))
    }
}

fn assignment(qualified_name: &str, value: &str) -> OsString {
    OsString::from(format!("-{}={}", qualified_name, value))
}

fn push_mode(args: &mut Vec<OsString>, mode: WriteMode) {
    if let Some(flag) = mode.flag() {
        args.push(OsString::from(flag));
    }
}

/// Passes the path through untouched; a relative path whose first component
/// starts with `-` gets a `./` prefix so the tool cannot read it as an option.
fn path_arg(path: &Path) -> OsString {
    match path.components().next() {
        Some(Component::Normal(first)) if first.to_string_lossy().starts_with('-') => {
            Path::new(".").join(path).into_os_string()
        }
        _ => path.as_os_str().to_os_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{temp_files, tool_missing, FakeRunner};
    use super::*;
    use crate::session::MetadataSession;

    fn client() -> (ExifToolClient<FakeRunner>, FakeRunner) {
        let runner = FakeRunner::default();
        let client = ExifToolClient::from_invoker(ToolInvoker::with_runner(
            "/usr/bin/exiftool",
            runner.clone(),
        ));
        (client, runner)
    }

    #[test]
    fn test_load_metadata_decodes_tool_output() {
        let (dir, files) = temp_files("load", &["a.jpg"]);
        let (client, runner) = client();
        runner.push_ok(r#"[{"SourceFile": "a.jpg", "EXIF:Make": "Canon", "File:FileType": "JPEG"}]"#);

        let entries = client.load_metadata(&files[0]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].group, "EXIF");

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][..3], ["-json", "-G", "-a"]);
        assert_eq!(calls[0][3], files[0].to_string_lossy());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_skips_tool() {
        let (client, runner) = client();
        let missing = Path::new("/no/such/dir/photo.jpg");
        assert!(matches!(
            client.load_metadata(missing),
            Err(MetaError::FileNotFound(path)) if path == missing
        ));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_load_propagates_parse_and_tool_errors() {
        let (dir, files) = temp_files("load_err", &["a.jpg"]);
        let (client, runner) = client();
        runner.push_ok("garbage");
        assert!(matches!(
            client.load_metadata(&files[0]),
            Err(MetaError::ParsingFailed(_))
        ));
        runner.push(tool_missing());
        assert!(matches!(
            client.load_metadata(&files[0]),
            Err(MetaError::ToolNotFound)
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_without_changes_does_not_invoke_tool() {
        let (dir, files) = temp_files("save_noop", &["a.jpg"]);
        let (client, runner) = client();
        let session = MetadataSession::with_entries(
            &files[0],
            vec![TagEntry::new("EXIF", "Make", "Canon")],
        );

        let outcome = client
            .save_metadata(session.path(), session.entries(), WriteMode::Overwrite)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(runner.calls().is_empty());
        assert!(session.modified_entries().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_writes_modified_entries_in_one_call() {
        let (dir, files) = temp_files("save", &["a.jpg"]);
        let (client, runner) = client();
        let mut session = MetadataSession::with_entries(
            &files[0],
            vec![
                TagEntry::new("EXIF", "Artist", "Someone"),
                TagEntry::new("EXIF", "Make", "Canon"),
                TagEntry::new("Other", "Rating", "3"),
                TagEntry::new("XMP", "Title", "Sea"),
            ],
        );
        let ids: Vec<_> = session.entries().iter().map(|entry| entry.id).collect();
        session.set_value(ids[0], "");
        session.set_value(ids[1], "Nikon");
        session.set_value(ids[2], "5");

        let outcome = client
            .save_metadata(session.path(), session.entries(), WriteMode::Overwrite)
            .unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Updated {
                message: "1 image files updated".to_string()
            }
        );

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![
                "-EXIF:Artist=".to_string(),
                "-EXIF:Make=Nikon".to_string(),
                "-Rating=5".to_string(),
                "-overwrite_original".to_string(),
                files[0].to_string_lossy().to_string(),
            ]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_rejects_read_only_entries_locally() {
        let (dir, files) = temp_files("save_ro", &["a.jpg"]);
        let (client, runner) = client();
        let mut session = MetadataSession::with_entries(
            &files[0],
            vec![TagEntry::new("Composite", "ImageSize", "1x1")],
        );
        let id = session.entries()[0].id;
        session.set_value(id, "2x2");

        match client.save_metadata(session.path(), session.entries(), WriteMode::KeepBackup) {
            Err(MetaError::WriteProtected(tag)) => assert_eq!(tag, "Composite:ImageSize"),
            other => panic!("expected WriteProtected, got {:?}", other),
        }
        assert!(runner.calls().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_strip_restore_and_add_arguments() {
        let (dir, files) = temp_files("ops", &["a.jpg"]);
        let (client, runner) = client();
        let file = files[0].to_string_lossy().to_string();

        client.strip_all(&files[0], WriteMode::KeepBackup).unwrap();
        client.restore_original(&files[0]).unwrap();
        client
            .add_tag(&files[0], "IPTC:Keywords", "beach", WriteMode::OverwriteInPlace)
            .unwrap();
        client
            .add_tag(&files[0], "Copyright", "me", WriteMode::KeepBackup)
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0], vec!["-all=".to_string(), file.clone()]);
        assert_eq!(calls[1], vec!["-restore_original".to_string(), file.clone()]);
        assert_eq!(
            calls[2],
            vec![
                "-IPTC:Keywords=beach".to_string(),
                "-overwrite_original_in_place".to_string(),
                file.clone(),
            ]
        );
        assert_eq!(calls[3], vec!["-Copyright=me".to_string(), file]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_restore_without_backup_fails() {
        let (dir, files) = temp_files("restore", &["a.jpg"]);
        let (client, runner) = client();
        runner.push_stderr(1, "Error: No original file for a.jpg");
        assert!(matches!(
            client.restore_original(&files[0]),
            Err(MetaError::ExecutionFailed(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_add_tag_validates_reference() {
        let (dir, files) = temp_files("add", &["a.jpg"]);
        let (client, runner) = client();
        assert!(matches!(
            client.add_tag(&files[0], "File:FileName", "b.jpg", WriteMode::KeepBackup),
            Err(MetaError::WriteProtected(_))
        ));
        assert!(matches!(
            client.add_tag(&files[0], "  ", "x", WriteMode::KeepBackup),
            Err(MetaError::InvalidTag(_))
        ));
        assert!(runner.calls().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_copy_tags_arguments() {
        let (dir, files) = temp_files("copy", &["a.jpg", "b.jpg"]);
        let (client, runner) = client();
        client
            .copy_tags(&files[0], &files[1], WriteMode::Overwrite)
            .unwrap();
        assert_eq!(
            runner.calls()[0],
            vec![
                "-tagsFromFile".to_string(),
                files[0].to_string_lossy().to_string(),
                "-all:all".to_string(),
                "-overwrite_original".to_string(),
                files[1].to_string_lossy().to_string(),
            ]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_reaches_tool_unchanged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, _) = temp_files("non_utf8", &[]);
        let file = dir.join(OsStr::from_bytes(b"caf\xe9.jpg"));
        std::fs::write(&file, b"fake image").unwrap();
        let (client, runner) = client();

        client.strip_all(&file, WriteMode::Overwrite).unwrap();
        let calls = runner.raw_calls();
        assert_eq!(calls.len(), 1);
        let last = calls[0].last().unwrap();
        assert_eq!(last.as_os_str(), file.as_os_str());
        assert!(Path::new(last).exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dash_prefixed_relative_path_is_not_an_option() {
        let arg = path_arg(Path::new("-odd.jpg"));
        assert!(!arg.to_string_lossy().starts_with('-'));
        assert_eq!(Path::new(&arg), Path::new("./-odd.jpg"));
        assert_eq!(
            Path::new(&path_arg(Path::new("-dir/a.jpg"))),
            Path::new("./-dir/a.jpg")
        );
        assert_eq!(path_arg(Path::new("a-b.jpg")), OsString::from("a-b.jpg"));
        assert_eq!(path_arg(Path::new("/tmp/-a.jpg")), OsString::from("/tmp/-a.jpg"));
    }
}
