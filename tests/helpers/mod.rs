use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use logo_preserve_worker::models::detection::{BoundingBox, Detection};
use logo_preserve_worker::processor::{ArtifactStore, Detector};
use logo_preserve_worker::services::detection::DetectionError;
use logo_preserve_worker::services::storage::StorageError;

/// In-memory object store standing in for the S3 gateway.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    objects: HashMap<String, Vec<u8>>,
    fail_downloads: bool,
    fail_upload_keys: HashSet<String>,
    uploads: Vec<String>,
}

impl MockStore {
    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.inner.lock().unwrap().objects.insert(key.to_string(), bytes);
    }

    pub fn fail_downloads(&self) {
        self.inner.lock().unwrap().fail_downloads = true;
    }

    pub fn fail_upload(&self, key: &str) {
        self.inner.lock().unwrap().fail_upload_keys.insert(key.to_string());
    }

    pub fn uploads(&self) -> Vec<String> {
        self.inner.lock().unwrap().uploads.clone()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }
}

impl ArtifactStore for MockStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let bytes = {
            let state = self.inner.lock().unwrap();
            if state.fail_downloads {
                return Err(StorageError::Config(format!(
                    "injected download failure for {key}"
                )));
            }
            state
                .objects
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::Config(format!("no such object: {key}")))?
        };
        std::fs::write(dest, bytes).map_err(StorageError::Io)
    }

    async fn upload(
        &self,
        src: &Path,
        key: &str,
        _content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let bytes = std::fs::read(src).map_err(StorageError::Io)?;
        let mut state = self.inner.lock().unwrap();
        if state.fail_upload_keys.contains(key) {
            return Err(StorageError::Config(format!(
                "injected upload failure for {key}"
            )));
        }
        state.objects.insert(key.to_string(), bytes);
        state.uploads.push(key.to_string());
        Ok(key.to_string())
    }
}

/// Scripted detection engine: pops one response per call, empty script means
/// zero detections.
#[derive(Clone, Default)]
pub struct MockDetector {
    responses: Arc<Mutex<VecDeque<Result<Vec<Detection>, String>>>>,
}

impl MockDetector {
    pub fn respond_with(&self, detections: Vec<Detection>) {
        self.responses.lock().unwrap().push_back(Ok(detections));
    }

    pub fn fail_with(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Err(message.to_string()));
    }
}

impl Detector for MockDetector {
    async fn detect(&self, _image_path: &Path) -> Result<Vec<Detection>, DetectionError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(detections)) => Ok(detections),
            Some(Err(message)) => Err(DetectionError::Engine(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// A 64x48 solid-color PNG, decodable by the extraction path.
pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(64, 48, image::Rgb([200, 40, 40]));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .unwrap();
    bytes
}

pub fn detection(x: i64, y: i64, width: i64, height: i64, class_name: &str) -> Detection {
    Detection {
        bounding_box: BoundingBox { x, y, width, height },
        confidence: 0.91,
        class_name: class_name.to_string(),
        class_id: 1,
    }
}

/// Fresh staging root under the system temp dir; caller removes it.
pub fn temp_staging_root(label: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("{label}_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

pub fn staging_entry_count(root: &Path) -> usize {
    std::fs::read_dir(root).unwrap().count()
}
