//! Veroeffentlichung festgeschriebener Nachrichten
//!
//! Laeuft als eigener Task ausserhalb des Schreibpfads und fuehrt je
//! Nachricht eine Befehlskette aus (z.B. `git add`, `git commit`,
//! `git push`). Scheitert ein Befehl, wird die Kette fuer diese Nachricht
//! abgebrochen und nur geloggt. Die gespeicherte Nachricht bleibt davon
//! unberuehrt.

use std::path::{Path, PathBuf};

use siegel_core::SiegelEvent;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::sync::oneshot;

use crate::config::VeroeffentlichungsEinstellungen;

#[derive(Debug, Error)]
pub enum VeroeffentlichungsFehler {
    #[error("Befehl '{befehl}' konnte nicht gestartet werden: {quelle}")]
    Start {
        befehl: String,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Befehl '{befehl}' fehlgeschlagen ({status}): {stderr}")]
    Fehlgeschlagen {
        befehl: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Fuehrt die konfigurierte Befehlskette je festgeschriebener Nachricht aus
#[derive(Debug, Clone)]
pub struct Veroeffentlicher {
    arbeitsverzeichnis: Option<PathBuf>,
    befehle: Vec<Vec<String>>,
}

impl Veroeffentlicher {
    pub fn neu(einstellungen: &VeroeffentlichungsEinstellungen) -> Self {
        Self {
            arbeitsverzeichnis: einstellungen.arbeitsverzeichnis.clone(),
            befehle: einstellungen.befehle.clone(),
        }
    }

    /// Verarbeitet Ereignisse bis `ende` ausloest oder der Sender wegfaellt
    ///
    /// Nach dem Ende-Signal werden die bereits gepufferten Ereignisse noch
    /// abgearbeitet. Wer nach `append` signalisiert, verliert also keine
    /// Nachricht.
    pub async fn laufen(
        self,
        mut empfaenger: broadcast::Receiver<SiegelEvent>,
        mut ende: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                ereignis = empfaenger.recv() => match ereignis {
                    Ok(ereignis) => self.verarbeiten(ereignis).await,
                    Err(RecvError::Lagged(verpasst)) => {
                        tracing::warn!(verpasst, "Veroeffentlicher kommt nicht hinterher, Ereignisse verpasst");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut ende => {
                    loop {
                        match empfaenger.try_recv() {
                            Ok(ereignis) => self.verarbeiten(ereignis).await,
                            Err(TryRecvError::Lagged(verpasst)) => {
                                tracing::warn!(verpasst, "Veroeffentlicher kommt nicht hinterher, Ereignisse verpasst");
                            }
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
        tracing::debug!("Veroeffentlicher beendet");
    }

    async fn verarbeiten(&self, ereignis: SiegelEvent) {
        let SiegelEvent::NachrichtGespeichert { key, pfad, .. } = ereignis;
        match self.veroeffentlichen(&key, &pfad).await {
            Ok(()) => tracing::info!(key = %key, "Nachricht veroeffentlicht"),
            Err(e) => tracing::error!(key = %key, fehler = %e, "Veroeffentlichung fehlgeschlagen"),
        }
    }

    /// Fuehrt alle Befehle fuer eine Nachricht nacheinander aus
    pub async fn veroeffentlichen(&self, key: &str, pfad: &Path) -> Result<(), VeroeffentlichungsFehler> {
        for vorlage in &self.befehle {
            let befehl = platzhalter_ersetzen(vorlage, key, pfad);
            let Some((programm, argumente)) = befehl.split_first() else {
                continue;
            };
            let anzeige = befehl.join(" ");

            let mut kommando = Command::new(programm);
            kommando.args(argumente);
            if let Some(verzeichnis) = &self.arbeitsverzeichnis {
                kommando.current_dir(verzeichnis);
            }

            tracing::debug!(befehl = %anzeige, "Starte Befehl");
            let ausgabe = kommando
                .output()
                .await
                .map_err(|quelle| VeroeffentlichungsFehler::Start {
                    befehl: anzeige.clone(),
                    quelle,
                })?;

            if !ausgabe.status.success() {
                return Err(VeroeffentlichungsFehler::Fehlgeschlagen {
                    befehl: anzeige,
                    status: ausgabe.status,
                    stderr: String::from_utf8_lossy(&ausgabe.stderr).trim().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Ersetzt `{datei}` und `{name}` in allen Argumenten
pub fn platzhalter_ersetzen(vorlage: &[String], key: &str, pfad: &Path) -> Vec<String> {
    let datei = pfad.display().to_string();
    vorlage
        .iter()
        .map(|teil| teil.replace("{datei}", &datei).replace("{name}", key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn befehle(liste: &[&[&str]]) -> Vec<Vec<String>> {
        liste
            .iter()
            .map(|b| b.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn platzhalter_werden_ersetzt() {
        let vorlage = befehle(&[&["git", "commit", "-m", "Add message {name}", "{datei}"]]);
        let ergebnis = platzhalter_ersetzen(
            &vorlage[0],
            "20250108_152842.txt",
            Path::new("/srv/messages/20250108_152842.txt"),
        );
        assert_eq!(
            ergebnis,
            vec![
                "git",
                "commit",
                "-m",
                "Add message 20250108_152842.txt",
                "/srv/messages/20250108_152842.txt",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn befehlskette_wird_ausgefuehrt() {
        let dir = tempfile::tempdir().unwrap();
        let veroeffentlicher = Veroeffentlicher::neu(&VeroeffentlichungsEinstellungen {
            aktiviert: true,
            arbeitsverzeichnis: Some(dir.path().to_path_buf()),
            befehle: befehle(&[
                &["sh", "-c", "echo add {name} >> protokoll"],
                &["sh", "-c", "echo push >> protokoll"],
            ]),
        });

        veroeffentlicher
            .veroeffentlichen("a.txt", Path::new("/tmp/a.txt"))
            .await
            .unwrap();

        let protokoll = std::fs::read_to_string(dir.path().join("protokoll")).unwrap();
        assert_eq!(protokoll, "add a.txt\npush\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fehlschlag_bricht_kette_ab() {
        let dir = tempfile::tempdir().unwrap();
        let veroeffentlicher = Veroeffentlicher::neu(&VeroeffentlichungsEinstellungen {
            aktiviert: true,
            arbeitsverzeichnis: Some(dir.path().to_path_buf()),
            befehle: befehle(&[
                &["sh", "-c", "echo kaputt >&2; exit 3"],
                &["sh", "-c", "echo nie >> protokoll"],
            ]),
        });

        let result = veroeffentlicher
            .veroeffentlichen("a.txt", Path::new("/tmp/a.txt"))
            .await;
        match result {
            Err(VeroeffentlichungsFehler::Fehlgeschlagen { stderr, .. }) => assert_eq!(stderr, "kaputt"),
            andere => panic!("Fehlschlag erwartet, erhalten: {andere:?}"),
        }
        assert!(!dir.path().join("protokoll").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ende_signal_arbeitet_puffer_ab_obwohl_sender_lebt() {
        let dir = tempfile::tempdir().unwrap();
        let veroeffentlicher = Veroeffentlicher::neu(&VeroeffentlichungsEinstellungen {
            aktiviert: true,
            arbeitsverzeichnis: Some(dir.path().to_path_buf()),
            befehle: befehle(&[&["sh", "-c", "echo {name} >> protokoll"]]),
        });

        let (sender, empfaenger) = broadcast::channel(8);
        let (ende_tx, ende_rx) = oneshot::channel();
        let handle = tokio::spawn(veroeffentlicher.laufen(empfaenger, ende_rx));

        for key in ["a.txt", "b.txt"] {
            sender
                .send(SiegelEvent::NachrichtGespeichert {
                    key: key.into(),
                    pfad: dir.path().join(key),
                    fingerprint: "0123abcd".parse().unwrap(),
                    message_type: siegel_core::MessageType::Message,
                    date: chrono::Utc::now(),
                })
                .unwrap();
        }
        ende_tx.send(()).unwrap();

        // `sender` bleibt am Leben, trotzdem endet der Task
        tokio::time::timeout(std::time::Duration::from_secs(10), handle)
            .await
            .expect("Veroeffentlicher endet nicht")
            .unwrap();
        drop(sender);

        let protokoll = std::fs::read_to_string(dir.path().join("protokoll")).unwrap();
        assert_eq!(protokoll, "a.txt\nb.txt\n");
    }

    #[tokio::test]
    async fn unbekanntes_programm_ist_startfehler() {
        let veroeffentlicher = Veroeffentlicher::neu(&VeroeffentlichungsEinstellungen {
            aktiviert: true,
            arbeitsverzeichnis: None,
            befehle: befehle(&[&["siegel-gibt-es-nicht-xyz"]]),
        });
        let result = veroeffentlicher
            .veroeffentlichen("a.txt", Path::new("a.txt"))
            .await;
        assert!(matches!(result, Err(VeroeffentlichungsFehler::Start { .. })));
    }
}
