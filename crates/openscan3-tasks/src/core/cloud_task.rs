//! Cloud synchronization: archiving and uploading a project to the
//! OpenScan cloud, and downloading/installing a project from it.
//!
//! Grounded in the original `CloudUploadTask`/`CloudDownloadTask`: chunked
//! upload against a server-allocated part list, download-link polling with
//! retries, Dropbox/OpenScan indirection-link resolution, and a streamed
//! chunked download that always cleans up its temp file — the last part
//! falls out for free here since `tempfile::NamedTempFile` removes itself
//! on drop, where the original needed an explicit `finally`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use openscan3_scheduler::task::{Task, TaskContext};

/// Target size of each uploaded part. The server tells us how many parts
/// it actually wants via `ulink`; this only drives how we split client-side.
const SPLIT_SIZE: u64 = 20 * 1024 * 1024;
const DOWNLOAD_RETRY_ATTEMPTS: u32 = 3;
const DOWNLOAD_RETRY_DELAY: Duration = Duration::from_secs(3);

/// The cloud-sync-specific slice of project management: archiving a
/// project for upload, and installing a downloaded archive as a new one.
/// Kept separate from `openscan3_core::ProjectManager`, which only knows
/// about scans.
#[async_trait::async_trait]
pub trait CloudProjectStore: Send + Sync {
    /// Zips the named project into a fresh temp file, returning its path
    /// and photo count.
    async fn archive_project(&self, project_name: &str) -> anyhow::Result<(PathBuf, u64)>;

    /// Extracts a downloaded archive into a newly created project.
    async fn install_archive(&self, archive_path: &Path) -> anyhow::Result<()>;

    async fn mark_uploaded(&self, project_name: &str) -> anyhow::Result<()>;

    /// True once `mark_uploaded` has run for this project.
    async fn is_uploaded(&self, project_name: &str) -> anyhow::Result<bool>;

    /// Atomically claims the upload slot for `project_name`. Returns `false`
    /// if another upload for the same project already holds it.
    async fn begin_upload(&self, project_name: &str) -> anyhow::Result<bool>;

    /// Releases the slot claimed by `begin_upload`, win or lose.
    async fn end_upload(&self, project_name: &str);
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectResponse {
    pub ulink: Vec<String>,
}

/// The OpenScan cloud REST API, abstracted so tests run without a live
/// server.
#[async_trait::async_trait]
pub trait CloudApi: Send + Sync {
    async fn create_remote_project(
        &self,
        remote_name: &str,
        parts_required: u64,
    ) -> anyhow::Result<CreateProjectResponse>;

    async fn upload_part(&self, upload_link: &str, bytes: Vec<u8>) -> anyhow::Result<()>;

    async fn start_project(&self, remote_name: &str) -> anyhow::Result<()>;

    /// Returns `Some(link)` once the remote project has a ready download
    /// link, `None` if it is still processing.
    async fn poll_download_link(&self, remote_name: &str) -> anyhow::Result<Option<String>>;

    /// Resolves an OpenScan indirection id to the link it points at (which
    /// may itself be another indirection link, or the final Dropbox link).
    async fn resolve_indirection_link(&self, id: &str) -> anyhow::Result<String>;

    /// Streams the archive at `direct_link`, invoking `on_chunk` for each
    /// chunk read. Returns the total byte count streamed.
    async fn stream_download(
        &self,
        direct_link: &str,
        on_chunk: &mut (dyn FnMut(&[u8]) -> anyhow::Result<()> + Send),
    ) -> anyhow::Result<u64>;
}

/// A local filesystem-backed `CloudProjectStore`. Archiving and extraction
/// are portable, hardware-free logic, so — unlike `CameraController` or
/// `MotorSubsystem` — this crate provides a real implementation rather than
/// leaving it entirely to the embedding binary.
pub struct FsCloudProjectStore {
    projects_root: PathBuf,
    uploading: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl FsCloudProjectStore {
    pub fn new(projects_root: PathBuf) -> Self {
        Self {
            projects_root,
            uploading: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }
}

#[async_trait::async_trait]
impl CloudProjectStore for FsCloudProjectStore {
    async fn archive_project(&self, project_name: &str) -> anyhow::Result<(PathBuf, u64)> {
        let project_dir = self.projects_root.join(project_name);
        let archive_path = std::env::temp_dir().join(format!(
            "{project_name}-{}.zip",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let archive_path_for_blocking = archive_path.clone();
        let photo_count =
            tokio::task::spawn_blocking(move || zip_directory(&project_dir, &archive_path_for_blocking)).await??;
        Ok((archive_path, photo_count))
    }

    async fn install_archive(&self, archive_path: &Path) -> anyhow::Result<()> {
        let stem = archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        let target_dir = self.projects_root.join(stem);
        let archive_path = archive_path.to_path_buf();
        tokio::task::spawn_blocking(move || unzip_to_directory(&archive_path, &target_dir)).await?
    }

    async fn mark_uploaded(&self, project_name: &str) -> anyhow::Result<()> {
        let marker = self.projects_root.join(project_name).join(".uploaded");
        tokio::fs::write(marker, b"").await?;
        Ok(())
    }

    async fn is_uploaded(&self, project_name: &str) -> anyhow::Result<bool> {
        let marker = self.projects_root.join(project_name).join(".uploaded");
        Ok(tokio::fs::try_exists(&marker).await?)
    }

    async fn begin_upload(&self, project_name: &str) -> anyhow::Result<bool> {
        Ok(self.uploading.lock().unwrap().insert(project_name.to_string()))
    }

    async fn end_upload(&self, project_name: &str) {
        self.uploading.lock().unwrap().remove(project_name);
    }
}

/// Recursively zips `dir`'s contents, returning a rough photo count (files
/// with an image extension) for progress reporting.
fn zip_directory(dir: &Path, archive_path: &Path) -> anyhow::Result<u64> {
    use std::io::{Read, Write};

    let file = std::fs::File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut photo_count = 0u64;

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            let relative = path.strip_prefix(dir)?.to_string_lossy().replace('\\', "/");

            if path.is_dir() {
                writer.add_directory(format!("{relative}/"), options)?;
                pending.push(path);
            } else {
                writer.start_file(relative, options)?;
                let mut contents = Vec::new();
                std::fs::File::open(&path)?.read_to_end(&mut contents)?;
                writer.write_all(&contents)?;
                if matches!(
                    path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref(),
                    Some("jpg" | "jpeg" | "png")
                ) {
                    photo_count += 1;
                }
            }
        }
    }
    writer.finish()?;
    Ok(photo_count)
}

/// Extracts `archive_path` into `target_dir`. Entries whose path would
/// escape `target_dir` (zip-slip) are skipped via `enclosed_name`.
fn unzip_to_directory(archive_path: &Path, target_dir: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(target_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let out_path = target_dir.join(enclosed);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out_file = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out_file)?;
        }
    }
    Ok(())
}

fn sanitized_remote_name(project_name: &str) -> String {
    let sanitized: String = project_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{sanitized}_{}.zip", Utc::now().format("%Y%m%d%H%M%S"))
}

#[derive(Debug, Deserialize)]
pub struct CloudUploadArgs {
    pub project_name: String,
}

/// Archives a project and uploads it to the cloud in parts.
pub struct CloudUploadTask {
    api: std::sync::Arc<dyn CloudApi>,
    store: std::sync::Arc<dyn CloudProjectStore>,
}

impl CloudUploadTask {
    pub const TASK_NAME: &'static str = "cloud_upload_task";

    pub fn new(api: std::sync::Arc<dyn CloudApi>, store: std::sync::Arc<dyn CloudProjectStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait::async_trait]
impl Task for CloudUploadTask {
    fn task_name(&self) -> &'static str {
        Self::TASK_NAME
    }

    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let CloudUploadArgs { project_name } = serde_json::from_value(args)?;

        if self.store.is_uploaded(&project_name).await? {
            anyhow::bail!("project '{project_name}' is already uploaded");
        }
        if !self.store.begin_upload(&project_name).await? {
            anyhow::bail!("another upload for project '{project_name}' is already pending or running");
        }

        let result = async {
            let (archive_path, photo_count) = self.store.archive_project(&project_name).await?;
            let result = self.upload_archive(&ctx, &project_name, &archive_path, photo_count).await;
            let _ = tokio::fs::remove_file(&archive_path).await;
            result
        }
        .await;
        self.store.end_upload(&project_name).await;
        result
    }
}

impl CloudUploadTask {
    async fn upload_archive(
        &self,
        ctx: &TaskContext,
        project_name: &str,
        archive_path: &Path,
        photo_count: u64,
    ) -> anyhow::Result<Option<Value>> {
        let archive_size = tokio::fs::metadata(archive_path).await?.len();
        let parts_required = archive_size.div_ceil(SPLIT_SIZE).max(1);
        let remote_name = sanitized_remote_name(project_name);

        let response = self.api.create_remote_project(&remote_name, parts_required).await?;
        if response.ulink.len() as u64 != parts_required {
            anyhow::bail!(
                "cloud allocated {} upload parts, expected {}",
                response.ulink.len(),
                parts_required
            );
        }

        let mut file = tokio::fs::File::open(archive_path).await?;
        for (index, upload_link) in response.ulink.iter().enumerate() {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            ctx.wait_for_pause().await;
            if ctx.is_cancelled() {
                return Ok(None);
            }

            let mut buffer = vec![0u8; SPLIT_SIZE as usize];
            let read = read_up_to(&mut file, &mut buffer).await?;
            buffer.truncate(read);

            self.api.upload_part(upload_link, buffer).await?;
            ctx.emit_progress(openscan3_core::TaskProgress::new(
                (index + 1) as u64,
                parts_required,
                format!("Uploaded part {} of {}.", index + 1, parts_required),
            ));
        }

        self.api.start_project(&remote_name).await?;
        self.store.mark_uploaded(project_name).await?;

        Ok(Some(json!({
            "remote_name": remote_name,
            "photo_count": photo_count,
            "parts_uploaded": parts_required,
        })))
    }
}

async fn read_up_to(file: &mut tokio::fs::File, buffer: &mut [u8]) -> anyhow::Result<usize> {
    let mut total = 0;
    while total < buffer.len() {
        let read = file.read(&mut buffer[total..]).await?;
        if read == 0 {
            break;
        }
        total += read;
    }
    Ok(total)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CloudDownloadArgs {
    pub remote_name: String,
}

/// Downloads and installs a project archive from the cloud.
pub struct CloudDownloadTask {
    api: std::sync::Arc<dyn CloudApi>,
    store: std::sync::Arc<dyn CloudProjectStore>,
}

impl CloudDownloadTask {
    pub const TASK_NAME: &'static str = "cloud_download_task";

    pub fn new(api: std::sync::Arc<dyn CloudApi>, store: std::sync::Arc<dyn CloudProjectStore>) -> Self {
        Self { api, store }
    }

    async fn await_download_link(&self, remote_name: &str) -> anyhow::Result<String> {
        for attempt in 1..=DOWNLOAD_RETRY_ATTEMPTS {
            if let Some(link) = self.api.poll_download_link(remote_name).await? {
                return Ok(link);
            }
            if attempt < DOWNLOAD_RETRY_ATTEMPTS {
                tokio::time::sleep(DOWNLOAD_RETRY_DELAY).await;
            }
        }
        anyhow::bail!("cloud project '{remote_name}' has no download link after {DOWNLOAD_RETRY_ATTEMPTS} attempts")
    }

    async fn resolve_direct_link(&self, mut link: String) -> anyhow::Result<String> {
        loop {
            if is_openscan_indirection(&link) {
                let id = extract_id_param(&link)
                    .ok_or_else(|| anyhow::anyhow!("indirection link missing an id parameter: {link}"))?;
                link = self.api.resolve_indirection_link(&id).await?;
                continue;
            }
            if is_dropbox_host(&link) {
                return Ok(with_dl_param(&link));
            }
            return Ok(link);
        }
    }
}

fn is_dropbox_host(link: &str) -> bool {
    link.contains("dropbox.com")
}

fn is_openscan_indirection(link: &str) -> bool {
    link.contains("openscan") && link.contains("id=")
}

fn with_dl_param(link: &str) -> String {
    if link.contains('?') {
        format!("{link}&dl=1")
    } else {
        format!("{link}?dl=1")
    }
}

fn extract_id_param(link: &str) -> Option<String> {
    let query = link.split('?').nth(1)?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "id").then(|| value.to_string())
    })
}

#[async_trait::async_trait]
impl Task for CloudDownloadTask {
    fn task_name(&self) -> &'static str {
        Self::TASK_NAME
    }

    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let CloudDownloadArgs { remote_name } = serde_json::from_value(args)?;

        let polled_link = self.await_download_link(&remote_name).await?;
        let direct_link = self.resolve_direct_link(polled_link).await?;

        let temp_file = tempfile::NamedTempFile::new()?;
        let temp_path = temp_file.path().to_path_buf();
        let mut sink = tokio::fs::File::create(&temp_path).await?;

        let cancelled = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let downloaded_bytes = self
            .stream_to_file(&ctx, &direct_link, &mut sink, &cancelled)
            .await?;

        if cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            return Ok(None);
        }

        self.store.install_archive(&temp_path).await?;
        // `temp_file` drops here, deleting the file regardless of how we got here.

        Ok(Some(json!({
            "remote_name": remote_name,
            "bytes_downloaded": downloaded_bytes,
        })))
    }
}

impl CloudDownloadTask {
    async fn stream_to_file(
        &self,
        ctx: &TaskContext,
        direct_link: &str,
        sink: &mut tokio::fs::File,
        cancelled: &std::sync::Arc<std::sync::atomic::AtomicBool>,
    ) -> anyhow::Result<u64> {
        let mut total = 0u64;
        let mut chunks = Vec::new();

        self.api
            .stream_download(direct_link, &mut |chunk| {
                chunks.push(chunk.to_vec());
                Ok(())
            })
            .await?;

        for chunk in chunks {
            if ctx.is_cancelled() {
                cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
                return Ok(total);
            }
            ctx.wait_for_pause().await;
            if ctx.is_cancelled() {
                cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
                return Ok(total);
            }

            sink.write_all(&chunk).await?;
            total += chunk.len() as u64;
            ctx.emit_progress(openscan3_core::TaskProgress::new(
                total,
                total,
                "Downloading project archive.",
            ));
        }
        sink.flush().await?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn ctx() -> (TaskContext, mpsc::UnboundedReceiver<openscan3_core::TaskProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TaskContext::new(
                "t".into(),
                openscan3_scheduler::cancellation::CancellationHandle::new(),
                openscan3_scheduler::cancellation::PauseGate::new(),
                tx,
            ),
            rx,
        )
    }

    struct FakeStore {
        archive_path: Mutex<Option<PathBuf>>,
        installed: AtomicU32,
        uploaded_marked: AtomicU32,
        already_uploaded: std::sync::atomic::AtomicBool,
        uploading: Mutex<std::collections::HashSet<String>>,
    }

    impl FakeStore {
        fn new(archive_path: Option<PathBuf>) -> Self {
            Self {
                archive_path: Mutex::new(archive_path),
                installed: AtomicU32::new(0),
                uploaded_marked: AtomicU32::new(0),
                already_uploaded: std::sync::atomic::AtomicBool::new(false),
                uploading: Mutex::new(std::collections::HashSet::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CloudProjectStore for FakeStore {
        async fn archive_project(&self, _project_name: &str) -> anyhow::Result<(PathBuf, u64)> {
            let path = self.archive_path.lock().unwrap().clone().unwrap();
            Ok((path, 5))
        }
        async fn install_archive(&self, _archive_path: &Path) -> anyhow::Result<()> {
            self.installed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn mark_uploaded(&self, _project_name: &str) -> anyhow::Result<()> {
            self.uploaded_marked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn is_uploaded(&self, _project_name: &str) -> anyhow::Result<bool> {
            Ok(self.already_uploaded.load(Ordering::SeqCst))
        }
        async fn begin_upload(&self, project_name: &str) -> anyhow::Result<bool> {
            Ok(self.uploading.lock().unwrap().insert(project_name.to_string()))
        }
        async fn end_upload(&self, project_name: &str) {
            self.uploading.lock().unwrap().remove(project_name);
        }
    }

    struct FakeApi {
        parts: Mutex<Vec<Vec<u8>>>,
        download_link: Mutex<Option<String>>,
        download_body: Vec<u8>,
    }

    #[async_trait::async_trait]
    impl CloudApi for FakeApi {
        async fn create_remote_project(
            &self,
            _remote_name: &str,
            parts_required: u64,
        ) -> anyhow::Result<CreateProjectResponse> {
            Ok(CreateProjectResponse {
                ulink: (0..parts_required).map(|i| format!("https://upload/{i}")).collect(),
            })
        }
        async fn upload_part(&self, _upload_link: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
            self.parts.lock().unwrap().push(bytes);
            Ok(())
        }
        async fn start_project(&self, _remote_name: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn poll_download_link(&self, _remote_name: &str) -> anyhow::Result<Option<String>> {
            Ok(self.download_link.lock().unwrap().clone())
        }
        async fn resolve_indirection_link(&self, _id: &str) -> anyhow::Result<String> {
            Ok("https://www.dropbox.com/s/abc/project.zip".into())
        }
        async fn stream_download(
            &self,
            _direct_link: &str,
            on_chunk: &mut (dyn FnMut(&[u8]) -> anyhow::Result<()> + Send),
        ) -> anyhow::Result<u64> {
            on_chunk(&self.download_body)?;
            Ok(self.download_body.len() as u64)
        }
    }

    #[tokio::test]
    async fn uploads_in_the_servers_allocated_parts() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("project.zip");
        tokio::fs::write(&archive, vec![1u8; (SPLIT_SIZE + 10) as usize]).await.unwrap();

        let api = std::sync::Arc::new(FakeApi {
            parts: Mutex::new(Vec::new()),
            download_link: Mutex::new(None),
            download_body: Vec::new(),
        });
        let store = std::sync::Arc::new(FakeStore::new(Some(archive)));

        let task = CloudUploadTask::new(api.clone(), store.clone());
        let (ctx, _rx) = ctx();
        let args = serde_json::to_value(CloudUploadArgsForTest {
            project_name: "My Scan!".into(),
        })
        .unwrap();

        let result = task.run(ctx, args).await.unwrap().unwrap();
        assert_eq!(result["parts_uploaded"], 2);
        assert_eq!(api.parts.lock().unwrap().len(), 2);
        assert_eq!(store.uploaded_marked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejects_upload_of_an_already_uploaded_project() {
        let api = std::sync::Arc::new(FakeApi {
            parts: Mutex::new(Vec::new()),
            download_link: Mutex::new(None),
            download_body: Vec::new(),
        });
        let store = FakeStore::new(None);
        store.already_uploaded.store(true, Ordering::SeqCst);
        let store = std::sync::Arc::new(store);

        let task = CloudUploadTask::new(api, store);
        let (ctx, _rx) = ctx();
        let args = serde_json::to_value(CloudUploadArgsForTest {
            project_name: "already-up".into(),
        })
        .unwrap();

        let err = task.run(ctx, args).await.unwrap_err();
        assert!(err.to_string().contains("already uploaded"));
    }

    #[tokio::test]
    async fn rejects_a_second_concurrent_upload_of_the_same_project() {
        let api = std::sync::Arc::new(FakeApi {
            parts: Mutex::new(Vec::new()),
            download_link: Mutex::new(None),
            download_body: Vec::new(),
        });
        let store = std::sync::Arc::new(FakeStore::new(None));
        assert!(store.begin_upload("in-flight").await.unwrap());

        let task = CloudUploadTask::new(api, store);
        let (ctx, _rx) = ctx();
        let args = serde_json::to_value(CloudUploadArgsForTest {
            project_name: "in-flight".into(),
        })
        .unwrap();

        let err = task.run(ctx, args).await.unwrap_err();
        assert!(err.to_string().contains("already pending or running"));
    }

    #[tokio::test]
    async fn resolves_indirection_then_dropbox_dl_param() {
        let api = std::sync::Arc::new(FakeApi {
            parts: Mutex::new(Vec::new()),
            download_link: Mutex::new(Some("https://cloud.openscan.eu/link?id=xyz".into())),
            download_body: b"zip-bytes".to_vec(),
        });
        let store = std::sync::Arc::new(FakeStore::new(None));

        let task = CloudDownloadTask::new(api.clone(), store.clone());
        let (ctx, _rx) = ctx();
        let args = serde_json::to_value(CloudDownloadArgs {
            remote_name: "remote.zip".into(),
        })
        .unwrap();

        let result = task.run(ctx, args).await.unwrap().unwrap();
        assert_eq!(result["bytes_downloaded"], 9);
        assert_eq!(store.installed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fs_store_round_trips_an_archive() {
        let projects_root = tempfile::tempdir().unwrap();
        let project_dir = projects_root.path().join("demo");
        tokio::fs::create_dir_all(project_dir.join("photos")).await.unwrap();
        tokio::fs::write(project_dir.join("photos/a.jpg"), b"photo-a").await.unwrap();
        tokio::fs::write(project_dir.join("photos/b.png"), b"photo-b").await.unwrap();
        tokio::fs::write(project_dir.join("scan.json"), b"{}").await.unwrap();

        let store = FsCloudProjectStore::new(projects_root.path().to_path_buf());
        let (archive_path, photo_count) = store.archive_project("demo").await.unwrap();
        assert_eq!(photo_count, 2);
        assert!(tokio::fs::metadata(&archive_path).await.unwrap().len() > 0);

        store.install_archive(&archive_path).await.unwrap();
        let extracted_stem = archive_path.file_stem().unwrap().to_string_lossy().into_owned();
        let extracted_dir = projects_root.path().join(extracted_stem);
        let restored = tokio::fs::read(extracted_dir.join("photos/a.jpg")).await.unwrap();
        assert_eq!(restored, b"photo-a");

        let _ = tokio::fs::remove_file(&archive_path).await;
    }

    #[derive(Serialize)]
    struct CloudUploadArgsForTest {
        project_name: String,
    }
}
