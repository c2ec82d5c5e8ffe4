use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Deployable binaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BinaryType {
    Player,
    Studio,
}

impl std::fmt::Display for BinaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryType::Player => write!(f, "Player"),
            BinaryType::Studio => write!(f, "Studio"),
        }
    }
}

impl std::str::FromStr for BinaryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "player" => Ok(BinaryType::Player),
            "studio" => Ok(BinaryType::Studio),
            other => Err(format!("unknown binary type: {other}")),
        }
    }
}

impl BinaryType {
    /// Name used by the deployment tracking service.
    pub fn api_name(&self) -> &'static str {
        match self {
            BinaryType::Player => "WindowsPlayer",
            BinaryType::Studio => "WindowsStudio64",
        }
    }

    /// Executable inside the version directory.
    pub fn executable(&self) -> &'static str {
        match self {
            BinaryType::Player => "RobloxPlayerBeta.exe",
            BinaryType::Studio => "RobloxStudioBeta.exe",
        }
    }

    /// Package name → subdirectory table for this binary.
    pub fn directories(&self) -> DirectoryMap {
        match self {
            BinaryType::Player => DirectoryMap::from_pairs(PLAYER_DIRECTORIES.iter().copied()),
            BinaryType::Studio => DirectoryMap::from_pairs(
                PLAYER_DIRECTORIES
                    .iter()
                    .chain(STUDIO_DIRECTORIES.iter())
                    .copied(),
            ),
        }
    }
}

const PLAYER_DIRECTORIES: &[(&str, &str)] = &[
    ("RobloxApp.zip", ""),
    ("shaders.zip", "shaders"),
    ("ssl.zip", "ssl"),
    ("WebView2.zip", ""),
    ("WebView2RuntimeInstaller.zip", "WebView2RuntimeInstaller"),
    ("content-avatar.zip", "content/avatar"),
    ("content-configs.zip", "content/configs"),
    ("content-fonts.zip", "content/fonts"),
    ("content-sky.zip", "content/sky"),
    ("content-sounds.zip", "content/sounds"),
    ("content-textures2.zip", "content/textures"),
    ("content-models.zip", "content/models"),
    ("content-textures3.zip", "PlatformContent/pc/textures"),
    ("content-terrain.zip", "PlatformContent/pc/terrain"),
    ("content-platform-fonts.zip", "PlatformContent/pc/fonts"),
    ("extracontent-luapackages.zip", "ExtraContent/LuaPackages"),
    ("extracontent-translations.zip", "ExtraContent/translations"),
    ("extracontent-models.zip", "ExtraContent/models"),
    ("extracontent-textures.zip", "ExtraContent/textures"),
    ("extracontent-places.zip", "ExtraContent/places"),
];

const STUDIO_DIRECTORIES: &[(&str, &str)] = &[
    ("RobloxStudio.zip", ""),
    ("Libraries.zip", ""),
    ("LibrariesQt5.zip", ""),
    ("redist.zip", ""),
    ("ApplicationConfig.zip", "ApplicationConfig"),
    ("BuiltInPlugins.zip", "BuiltInPlugins"),
    ("BuiltInStandalonePlugins.zip", "BuiltInStandalonePlugins"),
    ("Plugins.zip", "Plugins"),
    ("Qml.zip", "Qml"),
    ("StudioFonts.zip", "StudioFonts"),
    ("RibbonConfig.zip", "RibbonConfig"),
    ("content-api-docs.zip", "content/api_docs"),
    ("content-qt_translations.zip", "content/qt_translations"),
    ("content-studio_svg_textures.zip", "content/studio_svg_textures"),
    ("extracontent-scripts.zip", "ExtraContent/scripts"),
];

/// Static routing of package names to subdirectories of a version root.
/// Unmapped packages land in the root itself.
#[derive(Debug, Clone, Default)]
pub struct DirectoryMap {
    entries: HashMap<String, String>,
}

impl DirectoryMap {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(name, dir)| (name.to_string(), dir.to_string()))
                .collect(),
        }
    }

    /// Subdirectory (relative, `/`-separated) for `package`.
    pub fn subdirectory(&self, package: &str) -> &str {
        self.entries.get(package).map(String::as_str).unwrap_or("")
    }

    /// Absolute destination of `package` below `root`.
    pub fn destination(&self, root: &Path, package: &str) -> PathBuf {
        self.subdirectory(package)
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(root.to_path_buf(), |dir, part| dir.join(part))
    }
}
