use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use md5::{Digest, Md5};
use tempfile::TempDir;

use vinestrap_lib::{
    BinaryType, BootstrapError, BootstrapResult, Bootstrapper, Dirs, InstallStateStore, Settings,
    Transport,
};

const CLIENT_SETTINGS: &str = "https://clientsettings.test";
const MIRROR: &str = "https://setup.test";

/// Serves a fixed set of URLs from memory.
#[derive(Default)]
struct Deployment {
    files: HashMap<String, Vec<u8>>,
    hits: Mutex<Vec<String>>,
}

impl Deployment {
    fn serve(&mut self, url: String, body: Vec<u8>) {
        self.files.insert(url, body);
    }

    fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    fn body(&self, url: &str) -> BootstrapResult<Vec<u8>> {
        self.hits.lock().unwrap().push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| BootstrapError::NotFound {
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl Transport for Deployment {
    async fn get_text(&self, url: &str) -> BootstrapResult<String> {
        Ok(String::from_utf8(self.body(url)?).unwrap())
    }

    async fn download_to(&self, url: &str, dest: &Path) -> BootstrapResult<u64> {
        let body = self.body(url)?;
        std::fs::write(dest, &body).unwrap();
        Ok(body.len() as u64)
    }
}

fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .last_modified_time(zip::DateTime::default());
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

fn studio_deployment(guid: &str) -> Deployment {
    let packages = [
        ("RobloxStudio.zip", zip_of(&[("RobloxStudioBeta.exe", "MZ")])),
        ("content-fonts.zip", zip_of(&[("fonts/arial.ttf", "font")])),
        ("BuiltInPlugins.zip", zip_of(&[("Toolbox.rbxm", "plugin")])),
        ("RobloxStudioLauncherBeta.exe", b"launcher".to_vec()),
    ];

    let mut deployment = Deployment::default();
    deployment.serve(
        format!("{CLIENT_SETTINGS}/v2/client-version/WindowsStudio64/channel/zcanary"),
        format!(r#"{{"clientVersionUpload":"{guid}"}}"#).into_bytes(),
    );

    // The package list sits behind one level of indirection.
    deployment.serve(
        format!("{MIRROR}/channel/zcanary/{guid}-rbxPkgManifest.txt"),
        b"rbxPkgManifest.real.txt\n".to_vec(),
    );
    let mut list = String::from("v0\n");
    for (name, body) in &packages {
        list.push_str(&format!("{name}\n{}\n{}\n{}\n", md5_hex(body), body.len(), body.len()));
        deployment.serve(format!("{MIRROR}/channel/zcanary/{guid}-{name}"), body.clone());
    }
    deployment.serve(
        format!("{MIRROR}/channel/zcanary/{guid}-rbxPkgManifest.real.txt"),
        list.into_bytes(),
    );
    deployment
}

fn settings() -> Settings {
    let mut settings = Settings {
        client_settings_url: CLIENT_SETTINGS.to_string(),
        deploy_mirror: MIRROR.to_string(),
        verify_packages: true,
        ..Settings::default()
    };
    settings.studio.channel = "ZCanary".to_string();
    settings
}

#[tokio::test]
async fn studio_installs_from_channel_and_stays_installed() {
    let temp = TempDir::new().unwrap();
    let dirs = Dirs::under(temp.path());
    let deployment = Arc::new(studio_deployment("version-studio1"));

    let mut bootstrapper =
        Bootstrapper::new(dirs.clone(), settings(), deployment.clone()).unwrap();
    let plan = bootstrapper
        .prepare(BinaryType::Studio, vec!["-task".into(), "EditPlace".into()])
        .await
        .unwrap();

    let root = dirs.version_dir("version-studio1");
    assert_eq!(plan.version.channel, "zcanary");
    assert_eq!(plan.executable, root.join("RobloxStudioBeta.exe"));
    assert_eq!(plan.args, vec!["-task", "EditPlace"]);

    assert_eq!(std::fs::read(&plan.executable).unwrap(), b"MZ");
    assert_eq!(
        std::fs::read(root.join("content/fonts/fonts/arial.ttf")).unwrap(),
        b"font"
    );
    assert_eq!(
        std::fs::read(root.join("BuiltInPlugins/Toolbox.rbxm")).unwrap(),
        b"plugin"
    );
    assert!(root.join("RobloxStudioLauncherBeta.exe").is_file());
    assert!(root.join("AppSettings.xml").is_file());

    // A fresh load of the state file sees what was installed.
    let store = InstallStateStore::load(dirs.state_file()).unwrap();
    let recorded = store.load_manifest(BinaryType::Studio).unwrap();
    assert_eq!(recorded.version.guid, "version-studio1");
    assert_eq!(recorded.packages.len(), 4);
    assert!(store.load_manifest(BinaryType::Player).is_none());

    // Nothing but the lookup on the next run.
    let before = deployment.hits().len();
    let mut bootstrapper = Bootstrapper::new(dirs, settings(), deployment.clone()).unwrap();
    let again = bootstrapper.prepare(BinaryType::Studio, vec![]).await.unwrap();
    assert_eq!(again.executable, plan.executable);
    assert_eq!(deployment.hits().len(), before + 1);
}

#[tokio::test]
async fn corrupt_state_stops_before_any_network() {
    let temp = TempDir::new().unwrap();
    let dirs = Dirs::under(temp.path());
    std::fs::create_dir_all(dirs.data()).unwrap();
    std::fs::write(dirs.state_file(), "not json").unwrap();

    let deployment = Arc::new(studio_deployment("version-studio1"));
    let err = Bootstrapper::new(dirs, settings(), deployment.clone())
        .err()
        .unwrap();
    assert!(matches!(err, BootstrapError::CorruptState { .. }));
    assert!(deployment.hits().is_empty());
}
