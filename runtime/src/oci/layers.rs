//! Read-only filesystem view over an image's layer stack.
//!
//! Layers are tar archives (optionally gzip-compressed) applied bottom to
//! top. Lookups walk the stack from the top layer down, honouring OCI
//! whiteouts (`.wh.<name>`), opaque directory markers (`.wh..wh..opq`),
//! and symbolic/hard links inside the image.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deplab_core::error::{DeplabError, Result};
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tempfile::NamedTempFile;

const WHITEOUT_PREFIX: &str = ".wh.";
const OPAQUE_MARKER: &str = ".wh..wh..opq";
const MAX_LINK_HOPS: usize = 16;

/// Files as seen from inside an image.
///
/// Paths are interpreted relative to the image root; a leading `/` is
/// optional.
pub trait ImageFilesystem {
    /// Contents of a regular file, or `None` if it does not exist.
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Regular files directly inside `dir`, sorted by name.
    fn read_dir(&self, dir: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Ordered layer blobs of one image (bottom to top).
///
/// Each layer is scanned once when the stack is opened. Lookups consult the
/// in-memory index and read file contents by offset; gzip layers are
/// decompressed once into a scratch file so they can be read the same way.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Arc<Vec<LayerIndex>>,
}

#[derive(Debug)]
struct LayerIndex {
    /// Layer blob as given, for error messages
    source: PathBuf,
    /// Uncompressed tar that offsets refer to
    tar: PathBuf,
    nodes: HashMap<String, Node>,
    /// Paths hidden by a `.wh.<name>` marker in this layer
    whiteouts: HashSet<String>,
    /// Directories carrying an opaque marker in this layer
    opaque_dirs: HashSet<String>,
    _scratch: Option<NamedTempFile>,
}

#[derive(Debug, Clone)]
enum Node {
    File { offset: u64, size: u64 },
    /// Link target, already resolved to an image path
    Link(String),
    Other,
}

enum Hit {
    File { layer: usize, offset: u64, size: u64 },
    Link(String),
    Hidden,
    Absent,
}

impl LayerStack {
    /// Index every layer blob, bottom to top.
    pub fn open(layers: Vec<PathBuf>) -> Result<Self> {
        let layers = layers
            .iter()
            .map(|layer| LayerIndex::build(layer))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(layers = layers.len(), "Indexed image layers");
        Ok(Self {
            layers: Arc::new(layers),
        })
    }

    fn lookup(&self, target: &str) -> Hit {
        let ancestors = ancestors_of(target);
        for (idx, layer) in self.layers.iter().enumerate().rev() {
            match layer.nodes.get(target) {
                Some(Node::File { offset, size }) => {
                    return Hit::File {
                        layer: idx,
                        offset: *offset,
                        size: *size,
                    }
                }
                Some(Node::Link(next)) => return Hit::Link(next.clone()),
                Some(Node::Other) => return Hit::Hidden,
                None => {}
            }
            if layer.whiteouts.contains(target)
                || ancestors.iter().any(|a| layer.whiteouts.contains(a))
                || ancestors.iter().any(|a| layer.opaque_dirs.contains(a))
            {
                return Hit::Hidden;
            }
        }
        Hit::Absent
    }

    /// Whether `dir` or one of its ancestors is replaced in this layer.
    fn hides_lower(layer: &LayerIndex, dir: &str) -> bool {
        layer.opaque_dirs.contains(dir)
            || layer.whiteouts.contains(dir)
            || ancestors_of(dir).iter().any(|a| layer.whiteouts.contains(a))
    }
}

impl ImageFilesystem for LayerStack {
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let mut target = normalize(path);
        for _ in 0..MAX_LINK_HOPS {
            match self.lookup(&target) {
                Hit::File {
                    layer,
                    offset,
                    size,
                } => return self.layers[layer].read(offset, size).map(Some),
                Hit::Link(next) => target = next,
                Hit::Hidden | Hit::Absent => return Ok(None),
            }
        }
        Err(DeplabError::OciImageError(format!(
            "Too many levels of links resolving {}",
            path
        )))
    }

    fn read_dir(&self, dir: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let dir = normalize(dir);
        // None marks a name whited out by an upper layer
        let mut merged: BTreeMap<String, Option<(usize, Node)>> = BTreeMap::new();

        for (idx, layer) in self.layers.iter().enumerate().rev() {
            for (name, node) in &layer.nodes {
                let (parent, base) = split_parent(name);
                if parent == dir {
                    merged
                        .entry(base.to_string())
                        .or_insert_with(|| Some((idx, node.clone())));
                }
            }
            for hidden in &layer.whiteouts {
                let (parent, base) = split_parent(hidden);
                if parent == dir {
                    merged.entry(base.to_string()).or_insert(None);
                }
            }
            if Self::hides_lower(layer, &dir) {
                break;
            }
        }

        let mut files = Vec::new();
        for (name, found) in merged {
            match found {
                Some((layer, Node::File { offset, size })) => {
                    files.push((name, self.layers[layer].read(offset, size)?));
                }
                Some((_, Node::Link(_))) => {
                    if let Some(bytes) = self.read_file(&join(&dir, &name))? {
                        files.push((name, bytes));
                    }
                }
                Some((_, Node::Other)) | None => {}
            }
        }
        Ok(files)
    }
}

impl LayerIndex {
    fn build(source: &Path) -> Result<Self> {
        let (tar, scratch) = seekable_tar(source)?;
        let file = File::open(&tar).map_err(|e| layer_error(source, e))?;

        let mut index = LayerIndex {
            source: source.to_path_buf(),
            tar,
            nodes: HashMap::new(),
            whiteouts: HashSet::new(),
            opaque_dirs: HashSet::new(),
            _scratch: scratch,
        };

        let mut archive = Archive::new(BufReader::new(file));
        let entries = archive.entries().map_err(|e| layer_error(source, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| layer_error(source, e))?;
            let name = normalize(&entry.path().map_err(|e| layer_error(source, e))?.to_string_lossy());
            if name.is_empty() {
                continue;
            }

            let (parent, base) = split_parent(&name);
            if base == OPAQUE_MARKER {
                index.opaque_dirs.insert(parent.to_string());
                continue;
            }
            if let Some(hidden) = base.strip_prefix(WHITEOUT_PREFIX) {
                index.whiteouts.insert(join(parent, hidden));
                continue;
            }

            let kind = entry.header().entry_type();
            let node = match kind {
                EntryType::Symlink | EntryType::Link => {
                    let link = entry
                        .link_name()
                        .map_err(|e| layer_error(source, e))?
                        .map(|l| l.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    if kind == EntryType::Symlink && !link.starts_with('/') {
                        Node::Link(normalize(&join(parent, &link)))
                    } else {
                        Node::Link(normalize(&link))
                    }
                }
                k if k.is_file() => Node::File {
                    offset: entry.raw_file_position(),
                    size: entry.size(),
                },
                _ => Node::Other,
            };
            index.nodes.insert(name, node);
        }

        Ok(index)
    }

    fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let mut file = File::open(&self.tar).map_err(|e| layer_error(&self.source, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| layer_error(&self.source, e))?;

        let mut bytes = Vec::new();
        file.take(size)
            .read_to_end(&mut bytes)
            .map_err(|e| layer_error(&self.source, e))?;
        if bytes.len() as u64 != size {
            return Err(DeplabError::OciImageError(format!(
                "Layer {} is truncated",
                self.source.display()
            )));
        }
        Ok(bytes)
    }
}

/// Open a file that may or may not be gzip-compressed.
pub fn open_maybe_gzip(path: &Path) -> Result<Box<dyn Read>> {
    let (file, gzip) = sniff(path)?;
    let reader = BufReader::new(file);
    if gzip {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

fn sniff(path: &Path) -> Result<(File, bool)> {
    let mut file = File::open(path).map_err(|e| {
        DeplabError::OciImageError(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;
    Ok((file, read == 2 && magic == [0x1f, 0x8b]))
}

/// Path of an uncompressed copy of `layer`, decompressing into a scratch
/// file when needed.
fn seekable_tar(layer: &Path) -> Result<(PathBuf, Option<NamedTempFile>)> {
    let (file, gzip) = sniff(layer)?;
    if !gzip {
        return Ok((layer.to_path_buf(), None));
    }

    let mut scratch = NamedTempFile::new()?;
    std::io::copy(&mut GzDecoder::new(BufReader::new(file)), scratch.as_file_mut())
        .map_err(|e| layer_error(layer, e))?;
    Ok((scratch.path().to_path_buf(), Some(scratch)))
}

fn layer_error(layer: &Path, e: std::io::Error) -> DeplabError {
    DeplabError::OciImageError(format!("Failed to read layer {}: {}", layer.display(), e))
}

/// Canonical form of an in-image path: no leading `/` or `./`, no `.` or
/// `..` components, no trailing `/`.
pub(crate) fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Proper ancestor directories of `path`, outermost first.
fn ancestors_of(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    (1..parts.len()).map(|n| parts[..n].join("/")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    enum Item<'a> {
        File(&'a str, &'a [u8]),
        Symlink(&'a str, &'a str),
        Dir(&'a str),
    }

    fn create_layer(path: &Path, items: &[Item], gzip: bool) {
        let mut builder = tar::Builder::new(Vec::new());
        for item in items {
            let mut header = tar::Header::new_gnu();
            match item {
                Item::File(name, content) => {
                    header.set_size(content.len() as u64);
                    header.set_mode(0o644);
                    header.set_cksum();
                    builder.append_data(&mut header, name, *content).unwrap();
                }
                Item::Symlink(name, target) => {
                    header.set_entry_type(EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    builder.append_link(&mut header, name, target).unwrap();
                }
                Item::Dir(name) => {
                    header.set_entry_type(EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(0o755);
                    header.set_cksum();
                    builder.append_data(&mut header, name, std::io::empty()).unwrap();
                }
            }
        }
        let bytes = builder.into_inner().unwrap();
        if gzip {
            use flate2::write::GzEncoder;
            use flate2::Compression;
            use std::io::Write;
            let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
            encoder.write_all(&bytes).unwrap();
            encoder.finish().unwrap();
        } else {
            std::fs::write(path, bytes).unwrap();
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/etc/os-release"), "etc/os-release");
        assert_eq!(normalize("./etc//apt/"), "etc/apt");
        assert_eq!(normalize("etc/../usr/lib/os-release"), "usr/lib/os-release");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn test_read_file_top_layer_wins() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.tar");
        let top = dir.path().join("top.tar.gz");
        create_layer(&base, &[Item::File("etc/motd", b"base")], false);
        create_layer(&top, &[Item::File("./etc/motd", b"top")], true);

        let stack = LayerStack::open(vec![base, top]).unwrap();
        assert_eq!(stack.read_file("/etc/motd").unwrap(), Some(b"top".to_vec()));
        assert_eq!(stack.read_file("etc/missing").unwrap(), None);
    }

    #[test]
    fn test_read_file_respects_whiteout() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.tar");
        let top = dir.path().join("top.tar");
        create_layer(&base, &[Item::File("var/lib/dpkg/status", b"Package: x")], false);
        create_layer(&top, &[Item::File("var/lib/dpkg/.wh.status", b"")], false);

        let stack = LayerStack::open(vec![base, top]).unwrap();
        assert_eq!(stack.read_file("var/lib/dpkg/status").unwrap(), None);
    }

    #[test]
    fn test_read_file_respects_ancestor_whiteout() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.tar");
        let top = dir.path().join("top.tar");
        create_layer(&base, &[Item::File("var/lib/dpkg/status", b"Package: x")], false);
        create_layer(&top, &[Item::File("var/lib/.wh.dpkg", b"")], false);

        let stack = LayerStack::open(vec![base, top]).unwrap();
        assert_eq!(stack.read_file("var/lib/dpkg/status").unwrap(), None);
    }

    #[test]
    fn test_read_file_follows_relative_symlink() {
        let dir = TempDir::new().unwrap();
        let layer = dir.path().join("layer.tar");
        create_layer(
            &layer,
            &[
                Item::File("usr/lib/os-release", b"NAME=\"Debian\""),
                Item::Symlink("etc/os-release", "../usr/lib/os-release"),
            ],
            false,
        );

        let stack = LayerStack::open(vec![layer]).unwrap();
        assert_eq!(
            stack.read_file("etc/os-release").unwrap(),
            Some(b"NAME=\"Debian\"".to_vec())
        );
    }

    #[test]
    fn test_read_file_symlink_loop_is_error() {
        let dir = TempDir::new().unwrap();
        let layer = dir.path().join("layer.tar");
        create_layer(
            &layer,
            &[Item::Symlink("a", "b"), Item::Symlink("b", "a")],
            false,
        );

        let stack = LayerStack::open(vec![layer]).unwrap();
        assert!(stack.read_file("a").is_err());
    }

    #[test]
    fn test_read_dir_merges_layers() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.tar");
        let top = dir.path().join("top.tar");
        create_layer(
            &base,
            &[
                Item::Dir("status.d"),
                Item::File("status.d/zlib", b"old zlib"),
                Item::File("status.d/base-files", b"base-files"),
                Item::File("status.d/gone", b"gone"),
            ],
            false,
        );
        create_layer(
            &top,
            &[
                Item::File("status.d/zlib", b"new zlib"),
                Item::File("status.d/.wh.gone", b""),
                Item::File("status.d/nested/deeper", b"skip"),
            ],
            false,
        );

        let stack = LayerStack::open(vec![base, top]).unwrap();
        let files = stack.read_dir("/status.d").unwrap();
        assert_eq!(
            files,
            vec![
                ("base-files".to_string(), b"base-files".to_vec()),
                ("zlib".to_string(), b"new zlib".to_vec()),
            ]
        );
    }

    #[test]
    fn test_read_dir_opaque_marker_hides_lower_layers() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.tar");
        let top = dir.path().join("top.tar");
        create_layer(&base, &[Item::File("conf/a", b"a")], false);
        create_layer(
            &top,
            &[Item::File("conf/.wh..wh..opq", b""), Item::File("conf/b", b"b")],
            false,
        );

        let stack = LayerStack::open(vec![base, top]).unwrap();
        let names: Vec<String> = stack
            .read_dir("conf")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["b".to_string()]);
        assert_eq!(stack.read_file("conf/a").unwrap(), None);
    }

    #[test]
    fn test_read_dir_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let layer = dir.path().join("layer.tar");
        create_layer(&layer, &[Item::File("etc/hostname", b"box")], false);

        let stack = LayerStack::open(vec![layer]).unwrap();
        assert!(stack.read_dir("var/lib/dpkg/status.d").unwrap().is_empty());
    }

    #[test]
    fn test_gzip_layer_is_decompressed_once() {
        let dir = TempDir::new().unwrap();
        let layer = dir.path().join("layer.tar.gz");
        create_layer(
            &layer,
            &[
                Item::File("etc/os-release", b"ID=debian"),
                Item::File("status.d/zlib", b"zlib"),
            ],
            true,
        );

        let stack = LayerStack::open(vec![layer.clone()]).unwrap();
        std::fs::remove_file(&layer).unwrap();

        for _ in 0..3 {
            assert_eq!(
                stack.read_file("etc/os-release").unwrap(),
                Some(b"ID=debian".to_vec())
            );
        }
        assert_eq!(stack.read_dir("status.d").unwrap().len(), 1);
    }

    #[test]
    fn test_clones_share_index() {
        let dir = TempDir::new().unwrap();
        let layer = dir.path().join("layer.tar");
        create_layer(&layer, &[Item::File("etc/hostname", b"box")], false);

        let stack = LayerStack::open(vec![layer]).unwrap();
        let clone = stack.clone();
        assert!(Arc::ptr_eq(&stack.layers, &clone.layers));
        assert_eq!(clone.read_file("etc/hostname").unwrap(), Some(b"box".to_vec()));
    }

    #[test]
    fn test_missing_layer_is_error() {
        let stack = LayerStack::open(vec![PathBuf::from("/nonexistent/layer.tar")]);
        assert!(stack.is_err());
    }
}
