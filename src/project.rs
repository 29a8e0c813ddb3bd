use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// The visual theme selected for the application. Controls which platform
/// style the generated `AppTheme` inherits from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Classic,
    DeviceDefault,
    BlackText,
    Dark,
}

impl Theme {
    pub(crate) fn style_parent(self) -> &'static str {
        match self {
            Theme::Classic => "android:Theme",
            Theme::DeviceDefault => "android:Theme.DeviceDefault.Light",
            Theme::BlackText => "android:Theme.DeviceDefault.Light",
            Theme::Dark => "android:Theme.DeviceDefault",
        }
    }
}

/// Immutable descriptor of one build request. Created once per build from the
/// project editor's output and never mutated afterwards; everything the build
/// accumulates lives in [`crate::BuildContext`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Display name of the application.
    pub name: String,
    /// Output package name, e.g. `io.example.myapp`.
    pub package: String,
    pub version_code: u32,
    pub version_name: String,
    /// Minimum platform level the project itself declares. The manifest uses
    /// the maximum of this and every component's declared minimum.
    pub min_sdk: u32,
    /// Screen that receives the launcher intent filter. Must name one of the
    /// entries in `sources`.
    pub main_screen: String,
    /// Generated intermediate sources, one per screen.
    pub sources: Vec<Utf8PathBuf>,
    /// Directory holding the project's own media assets, if any.
    pub assets_dir: Option<Utf8PathBuf>,
    /// Source image the launcher icons are derived from.
    pub icon: Option<Utf8PathBuf>,
    #[serde(default)]
    pub theme: Theme,
    /// Primary brand color as `#RRGGBB`.
    #[serde(default = "default_primary")]
    pub primary_color: String,
    #[serde(default = "default_accent")]
    pub accent_color: String,
}

fn default_primary() -> String {
    "#3F51B5".into()
}

fn default_accent() -> String {
    "#FF4081".into()
}

impl Project {
    /// Read a descriptor from its JSON form. Parsing the editor's own project
    /// format happens upstream; this only accepts the already-structured shape.
    pub fn from_json(data: &str) -> serde_json::Result<Project> {
        serde_json::from_str(data)
    }

    /// Class-name stems of every screen, in source order.
    pub fn screens(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().filter_map(|path| path.file_stem())
    }

    /// File stem of the produced package. The display name may contain
    /// anything, including path separators, so everything unsafe for a file
    /// name is dropped; the package name stands in when nothing survives.
    pub fn artifact_stem(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();

        if stem.trim_matches('.').is_empty() {
            self.package.clone()
        } else {
            stem
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_from_json() {
        let project = Project::from_json(
            r#"{
                "name": "My App",
                "package": "io.example.myapp",
                "version_code": 3,
                "version_name": "1.2",
                "min_sdk": 21,
                "main_screen": "Screen1",
                "sources": ["build/src/Screen1.java", "build/src/About.java"],
                "assets_dir": null,
                "icon": null,
                "theme": "device_default"
            }"#,
        )
        .unwrap();

        assert_eq!(project.package, "io.example.myapp");
        assert_eq!(project.theme, Theme::DeviceDefault);
        assert_eq!(
            project.screens().collect::<Vec<_>>(),
            vec!["Screen1", "About"]
        );
        assert_eq!(project.primary_color, "#3F51B5");
    }

    #[test]
    fn artifact_stem_survives_hostile_display_names() {
        let mut project = Project::from_json(
            r#"{
                "name": "My App",
                "package": "io.example.myapp",
                "version_code": 1,
                "version_name": "1.0",
                "min_sdk": 21,
                "main_screen": "Screen1",
                "sources": ["build/src/Screen1.java"],
                "assets_dir": null,
                "icon": null
            }"#,
        )
        .unwrap();

        assert_eq!(project.artifact_stem(), "MyApp");

        project.name = "Demo & Co".into();
        assert_eq!(project.artifact_stem(), "DemoCo");

        project.name = "../../../etc/passwd".into();
        assert_eq!(project.artifact_stem(), "......etcpasswd");

        // Nothing usable survives, so the package name stands in.
        project.name = "/// ".into();
        assert_eq!(project.artifact_stem(), "io.example.myapp");
    }
}
