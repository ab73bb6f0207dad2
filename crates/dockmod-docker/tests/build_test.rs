//! End-to-end tests of the build pipeline against a recording engine

use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use dockmod_docker::{
    run_build, BuildContext, BuildRequest, ContextKind, DockerError, EventStream,
    ImageBuildOptions, ImageBuildService, JsonMessage,
};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Engine double that records submitted builds and replays canned messages
#[derive(Default)]
struct RecordingEngine {
    messages: Vec<JsonMessage>,
    builds: Arc<Mutex<Vec<(ImageBuildOptions, ContextKind, Bytes)>>>,
    tags: Arc<Mutex<Vec<(String, String)>>>,
    reject: bool,
}

impl RecordingEngine {
    fn replaying(messages: Vec<JsonMessage>) -> Self {
        Self { messages, ..Default::default() }
    }

    fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageBuildService for RecordingEngine {
    async fn build_image<'a>(
        &'a self,
        options: &ImageBuildOptions,
        context: BuildContext,
    ) -> dockmod_docker::Result<EventStream<'a>> {
        let kind = context.kind();
        let body = context.into_bytes().await?;
        self.builds.lock().unwrap().push((options.clone(), kind, body));

        if self.reject {
            return Err(DockerError::StreamError { reason: "connection refused".to_string() });
        }

        let messages: Vec<dockmod_docker::Result<JsonMessage>> =
            self.messages.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(messages)))
    }

    async fn tag_image(&self, image: &str, reference: &str) -> dockmod_docker::Result<()> {
        self.tags.lock().unwrap().push((image.to_string(), reference.to_string()));
        Ok(())
    }
}

fn sample_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM alpine\nCOPY . /src\n").unwrap();
    std::fs::create_dir_all(dir.path().join("src/bin")).unwrap();
    std::fs::write(dir.path().join("src/bin/run.sh"), "#!/bin/sh\necho run\n").unwrap();
    std::fs::write(dir.path().join("README"), "sample\n").unwrap();
    dir
}

fn successful_build() -> Vec<JsonMessage> {
    vec![
        JsonMessage::stream("Step 1/2 : FROM alpine\n"),
        JsonMessage::stream("Step 2/2 : COPY . /src\n"),
        JsonMessage::aux(json!({"ID": "sha256:abc"})),
        JsonMessage::stream("Successfully built abc\n"),
    ]
}

/// Relative path and content of every regular file under `root`
fn tree_files(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap().to_string_lossy().to_string();
            (relative, std::fs::read(entry.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_directory_build_end_to_end() {
    let project = sample_project();
    let engine = RecordingEngine::replaying(successful_build());
    let request = BuildRequest::new(project.path())
        .with_tag("app:1.0")
        .with_tag("app:latest")
        .with_tag("registry.example.com/team/app:1.0");

    let mut display: Vec<u8> = Vec::new();
    let outcome = run_build(&engine, &request, &mut display).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.image_id, "sha256:abc");
    assert_eq!(outcome.stdout.as_bytes(), display.as_slice());
    assert_eq!(
        outcome.stdout,
        "Step 1/2 : FROM alpine\nStep 2/2 : COPY . /src\nSuccessfully built abc\n"
    );

    let builds = engine.builds.lock().unwrap();
    let (options, kind, body) = &builds[0];
    assert_eq!(*kind, ContextKind::Directory);
    assert_eq!(options.tags, request.tags);

    // The submitted context unpacks to the original tree
    let unpacked = TempDir::new().unwrap();
    tar::Archive::new(GzDecoder::new(&body[..])).unpack(unpacked.path()).unwrap();
    assert_eq!(tree_files(unpacked.path()), tree_files(project.path()));

    // Tags beyond the first are applied after the build
    let tags = engine.tags.lock().unwrap();
    assert_eq!(
        *tags,
        vec![
            ("sha256:abc".to_string(), "app:latest".to_string()),
            ("sha256:abc".to_string(), "registry.example.com/team/app:1.0".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_gzip_archive_is_submitted_verbatim() {
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("context.tgz");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    {
        let mut builder = tar::Builder::new(&mut encoder);
        let content = b"FROM alpine\n";
        let mut header = tar::Header::new_gnu();
        header.set_path("Dockerfile").unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &content[..]).unwrap();
        builder.finish().unwrap();
    }
    let original = encoder.finish().unwrap();
    std::fs::write(&archive_path, &original).unwrap();

    let engine = RecordingEngine::replaying(successful_build());
    let mut display: Vec<u8> = Vec::new();
    let outcome = run_build(&engine, &BuildRequest::new(&archive_path), &mut display)
        .await
        .unwrap();
    assert!(outcome.is_success());

    let builds = engine.builds.lock().unwrap();
    let (_, kind, body) = &builds[0];
    assert_eq!(*kind, ContextKind::Archive);
    assert_eq!(body.as_ref(), original.as_slice());

    let mut dockerfile = String::new();
    let mut archive = tar::Archive::new(GzDecoder::new(&body[..]));
    archive.entries().unwrap().next().unwrap().unwrap().read_to_string(&mut dockerfile).unwrap();
    assert_eq!(dockerfile, "FROM alpine\n");
}

#[tokio::test]
async fn test_unsupported_file_never_reaches_engine() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "FROM alpine").unwrap();

    let engine = RecordingEngine::replaying(successful_build());
    let mut display: Vec<u8> = Vec::new();
    let err = run_build(&engine, &BuildRequest::new(file.path()), &mut display)
        .await
        .unwrap_err();

    assert!(matches!(err, DockerError::UnsupportedContext { .. }));
    assert_eq!(engine.build_count(), 0);
    assert!(display.is_empty());
}

#[tokio::test]
async fn test_empty_src_is_rejected() {
    let engine = RecordingEngine::default();
    let mut display: Vec<u8> = Vec::new();
    let err = run_build(&engine, &BuildRequest::default(), &mut display).await.unwrap_err();

    assert!(err.is_input_error());
    assert_eq!(engine.build_count(), 0);
}

#[tokio::test]
async fn test_rejected_build_call() {
    let project = sample_project();
    let engine = RecordingEngine { reject: true, ..Default::default() };

    let mut display: Vec<u8> = Vec::new();
    let err = run_build(&engine, &BuildRequest::new(project.path()), &mut display)
        .await
        .unwrap_err();

    assert!(matches!(err, DockerError::StreamError { .. }));
    assert!(display.is_empty());
}

#[tokio::test]
async fn test_failed_build_keeps_partial_outcome() {
    let project = sample_project();
    let engine = RecordingEngine::replaying(vec![
        JsonMessage::stream("Step 1/2 : FROM alpine\n"),
        JsonMessage::stream("Step 2/2 : RUN exit 3\n"),
        JsonMessage::error(3, "The command '/bin/sh -c exit 3' returned a non-zero code: 3"),
    ]);
    let request = BuildRequest::new(project.path()).with_tag("app:1.0").with_tag("app:latest");

    let mut display: Vec<u8> = Vec::new();
    let outcome = run_build(&engine, &request, &mut display).await.unwrap();

    assert!(!outcome.is_success());
    assert!(outcome.image_id.is_empty());
    assert_eq!(outcome.stdout, "Step 1/2 : FROM alpine\nStep 2/2 : RUN exit 3\n");
    assert_eq!(
        outcome.error.unwrap().to_string(),
        "Docker build failed: The command '/bin/sh -c exit 3' returned a non-zero code: 3"
    );
    assert!(engine.tags.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_image_id_skips_extra_tags_with_warning() {
    let project = sample_project();
    let engine = RecordingEngine::replaying(vec![
        JsonMessage::stream("Step 1/1 : FROM alpine\n"),
        JsonMessage::stream("Successfully built abc\n"),
    ]);
    let request = BuildRequest::new(project.path())
        .with_tag("app:1.0")
        .with_tag("app:latest")
        .with_tag("app:stable");

    let mut display: Vec<u8> = Vec::new();
    let outcome = run_build(&engine, &request, &mut display).await.unwrap();

    assert!(outcome.is_success());
    assert!(outcome.image_id.is_empty());
    assert!(engine.tags.lock().unwrap().is_empty());
    assert_eq!(
        outcome.warnings,
        vec!["No image id reported by the build, tags not applied: app:latest, app:stable"]
    );
}

#[tokio::test]
async fn test_single_tag_without_image_id_has_no_warning() {
    let project = sample_project();
    let engine = RecordingEngine::replaying(vec![JsonMessage::stream("done\n")]);
    let request = BuildRequest::new(project.path()).with_tag("app:1.0");

    let mut display: Vec<u8> = Vec::new();
    let outcome = run_build(&engine, &request, &mut display).await.unwrap();

    assert!(outcome.is_success());
    assert!(outcome.warnings.is_empty());
}
