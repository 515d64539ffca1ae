use crate::models::InstallationSource;
use crate::platform::RawInstallerInfo;

const PLAY_INSTALLERS: &[&str] = &["com.android.vending", "com.google.android.feedback"];
const AMAZON_INSTALLERS: &[&str] = &["com.amazon.venezia"];

impl InstallationSource {
    pub fn classify(info: &RawInstallerInfo) -> Self {
        match info {
            RawInstallerInfo::Android { installer_package } => match installer_package.as_deref() {
                Some(pkg) if PLAY_INSTALLERS.contains(&pkg) => InstallationSource::PlayStore,
                Some(pkg) if AMAZON_INSTALLERS.contains(&pkg) => InstallationSource::AmazonAppstore,
                Some(_) => InstallationSource::Sideloaded,
                None => InstallationSource::Unknown,
            },
            RawInstallerInfo::Ios { receipt, simulator } => {
                if *simulator {
                    return InstallationSource::Debug;
                }
                match receipt.as_deref() {
                    Some("sandboxReceipt") => InstallationSource::TestFlight,
                    Some("receipt") => InstallationSource::AppStore,
                    // Builds installed from Xcode carry no receipt.
                    None => InstallationSource::Debug,
                    Some(_) => InstallationSource::Unknown,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn android(installer: Option<&str>) -> RawInstallerInfo {
        RawInstallerInfo::Android {
            installer_package: installer.map(str::to_string),
        }
    }

    fn ios(receipt: Option<&str>, simulator: bool) -> RawInstallerInfo {
        RawInstallerInfo::Ios {
            receipt: receipt.map(str::to_string),
            simulator,
        }
    }

    #[test]
    fn classifies_android_installers() {
        use InstallationSource::*;
        let cases = [
            (android(Some("com.android.vending")), PlayStore),
            (android(Some("com.google.android.feedback")), PlayStore),
            (android(Some("com.amazon.venezia")), AmazonAppstore),
            (android(Some("org.fdroid.fdroid")), Sideloaded),
            // adb installs report the shell as installer.
            (android(Some("com.android.shell")), Sideloaded),
            (android(None), Unknown),
        ];
        for (info, expected) in cases {
            assert_eq!(InstallationSource::classify(&info), expected, "{info:?}");
        }
    }

    #[test]
    fn classifies_ios_receipts() {
        assert_eq!(
            InstallationSource::classify(&ios(Some("sandboxReceipt"), false)),
            InstallationSource::TestFlight
        );
        assert_eq!(
            InstallationSource::classify(&ios(Some("receipt"), false)),
            InstallationSource::AppStore
        );
        assert_eq!(
            InstallationSource::classify(&ios(Some("receipt"), true)),
            InstallationSource::Debug
        );
        assert_eq!(
            InstallationSource::classify(&ios(None, false)),
            InstallationSource::Debug
        );
    }

    #[test]
    fn decodes_tagged_installer_info() {
        let info: RawInstallerInfo = serde_json::from_str(
            r#"{"platform":"android","installerPackage":"com.android.vending"}"#,
        )
        .unwrap();
        assert_eq!(InstallationSource::classify(&info), InstallationSource::PlayStore);
    }
}
