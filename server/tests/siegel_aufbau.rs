//! Integration-Tests: Aufbau aus der Konfiguration und Senden

use std::path::Path;

use siegel_server::{config::SiegelConfig, eingabe::EingabeFehler, Siegel};

fn config(basis: &Path) -> SiegelConfig {
    let mut config = SiegelConfig::default();
    config.speicher.nachrichten_verzeichnis = basis.join("messages");
    config.speicher.schluessel_verzeichnis = basis.join("keys");
    config
}

#[tokio::test]
async fn senden_und_auflisten() {
    let dir = tempfile::tempdir().unwrap();

    let siegel = Siegel::aufbauen(config(dir.path())).await.unwrap();
    assert!(dir.path().join("keys/local.pem").exists());
    assert!(dir.path().join("keys/local.pub").exists());
    let fingerprint = siegel.chat().fingerprint().clone();

    let nachricht = siegel.senden("  hallo\u{7}  \n", "message").await.unwrap();
    assert_eq!(nachricht.record.content, "hallo");
    assert!(dir.path().join("messages").join(&nachricht.key).exists());

    // Zweiter Aufbau laedt dieselbe Identitaet
    let siegel = Siegel::aufbauen(config(dir.path())).await.unwrap();
    assert_eq!(siegel.chat().fingerprint(), &fingerprint);

    let liste = siegel.chat().list().await.unwrap();
    assert_eq!(liste.len(), 1);
    assert!(liste[0].verified);
    assert_eq!(liste[0].nachricht.key, nachricht.key);
}

#[tokio::test]
async fn ungueltige_eingabe_schreibt_nichts() {
    let dir = tempfile::tempdir().unwrap();

    let siegel = Siegel::aufbauen(config(dir.path())).await.unwrap();
    let fehler = siegel.senden(" \n ", "message").await.unwrap_err();
    assert_eq!(fehler.downcast_ref::<EingabeFehler>(), Some(&EingabeFehler::Leer));

    let siegel = Siegel::aufbauen(config(dir.path())).await.unwrap();
    assert!(siegel.senden("hallo", "bogus").await.is_err());

    let eintraege = std::fs::read_dir(dir.path().join("messages")).unwrap().count();
    assert_eq!(eintraege, 0);
}

#[cfg(unix)]
#[tokio::test]
async fn veroeffentlichung_laeuft_nach_dem_senden() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = config(dir.path());
    config.veroeffentlichung.aktiviert = true;
    config.veroeffentlichung.arbeitsverzeichnis = Some(dir.path().to_path_buf());
    config.veroeffentlichung.befehle = vec![
        vec!["sh".into(), "-c".into(), "echo {name} >> veroeffentlicht".into()],
        vec!["sh".into(), "-c".into(), "exit 1".into()],
    ];

    let siegel = Siegel::aufbauen(config).await.unwrap();
    // Fehlschlag der Kette laesst das Senden gelingen
    let nachricht = siegel.senden("hallo", "system").await.unwrap();

    let protokoll = std::fs::read_to_string(dir.path().join("veroeffentlicht")).unwrap();
    assert_eq!(protokoll.trim(), nachricht.key);
}

#[cfg(unix)]
#[tokio::test]
async fn senden_kehrt_zurueck_waehrend_chat_geteilt_ist() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = config(dir.path());
    config.veroeffentlichung.aktiviert = true;
    config.veroeffentlichung.befehle = vec![vec!["true".into()]];

    let siegel = Siegel::aufbauen(config).await.unwrap();
    let geteilt = std::sync::Arc::clone(siegel.chat());

    let nachricht = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        siegel.senden("hallo", "message"),
    )
    .await
    .expect("senden haengt")
    .unwrap();

    assert_eq!(geteilt.get(&nachricht.key).await.unwrap().nachricht.key, nachricht.key);
    assert!(geteilt.get(&nachricht.key).await.unwrap().verified);
}
