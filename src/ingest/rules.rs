//! Heuristics for mapping production files to pipeline stages.

use std::path::Path;

/// 3D scene and mesh formats
pub const MESH_EXTENSIONS: &[&str] = &[
    "fbx", "obj", "blend", "max", "ma", "mb", "ztl", "abc", "gltf", "glb", "usd", "usda", "usdc",
    "usdz",
];

/// Image and texture formats
pub const TEXTURE_EXTENSIONS: &[&str] = &["psd", "png", "jpg", "jpeg", "tga", "exr", "tif", "tiff"];

/// Ordered (stage id, keywords) table; the first matching row wins.
///
/// Matching is plain substring search, so short keywords like "hp" or "ao"
/// fire inside longer words too.
const STAGE_KEYWORDS: &[(&str, &[&str])] = &[
    ("concept", &["concept", "ref"]),
    ("blockout", &["blockout", "proxy"]),
    ("highpoly", &["highpoly", "high_poly", "hp", "sculpt"]),
    ("lowpoly", &["lowpoly", "low_poly", "lp", "game"]),
    ("uv", &["uv"]),
    ("bake", &["bake", "normal", "ao"]),
    ("texture", &["texture", "material", "tex"]),
    ("export", &["export", "final"]),
];

/// Kind of production file, by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Mesh,
    Texture,
}

impl FileKind {
    /// Classify `path` by extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if MESH_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Mesh)
        } else if TEXTURE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Texture)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Mesh => "mesh",
            FileKind::Texture => "texture",
        }
    }
}

/// All extensions recognised by default
pub fn default_extensions() -> Vec<String> {
    MESH_EXTENSIONS
        .iter()
        .chain(TEXTURE_EXTENSIONS)
        .map(|e| e.to_string())
        .collect()
}

/// Guess the stage from a file's relative directory and name.
///
/// Returns `None` when no keyword matches; callers use the first stage.
pub fn infer_stage(relative_dir: &str, file_name: &str) -> Option<&'static str> {
    let haystack = format!("{}{}", relative_dir, file_name).to_lowercase();

    STAGE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(stage, _)| *stage)
}
