//! Disk-Backend fuer Nachrichtendateien
//!
//! Schreibt nie in eine sichtbare Datei hinein. Jede Datei durchlaeuft:
//! `abwesend -> bereitgestellt (versteckte Temp-Datei) -> festgeschrieben`.
//! Das Festschreiben ist ein Hardlink auf den endgueltigen Namen. Der Link
//! scheitert atomar mit `AlreadyExists`, wenn der Name vergeben ist, daher
//! wird nie eine vorhandene Nachricht ueberschrieben.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::ChatResult;
use crate::types::RecordKey;

/// Endung der Temp-Dateien, die `list_names` nie liefert
const TEMP_ENDUNG: &str = ".tmp";

/// Ergebnis eines Festschreib-Versuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Datei ist unter dem Namen sichtbar
    Festgeschrieben,
    /// Name war bereits vergeben, nichts wurde veraendert
    NameBelegt,
}

/// Vollstaendig geschriebene, noch unsichtbare Temp-Datei
///
/// Wird beim Drop entfernt. Nach einem erfolgreichen Commit bleibt die
/// Nachricht ueber den zweiten Link erhalten.
#[derive(Debug)]
pub struct Bereitgestellt {
    pfad: PathBuf,
}

impl Bereitgestellt {
    pub fn pfad(&self) -> &Path {
        &self.pfad
    }
}

impl Drop for Bereitgestellt {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.pfad) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(%e, pfad = %self.pfad.display(), "Temp-Datei konnte nicht entfernt werden");
            }
        }
    }
}

/// Disk-basiertes Storage-Backend
///
/// Speichert Dateien flach unter `base_dir/<name>`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    base_dir: PathBuf,
}

impl DiskStorage {
    /// Neues DiskStorage mit dem angegebenen Basisverzeichnis erstellen
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Vollstaendigen Dateipfad aus dem Namen berechnen
    pub fn full_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Basisverzeichnis anlegen falls noetig
    pub async fn verzeichnis_anlegen(&self) -> ChatResult<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    /// Schreibt `data` vollstaendig in eine versteckte Temp-Datei
    pub async fn stage(&self, data: &[u8]) -> ChatResult<Bereitgestellt> {
        let pfad = self
            .base_dir
            .join(format!(".{}{}", Uuid::new_v4(), TEMP_ENDUNG));

        let mut datei = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&pfad)
            .await?;
        // Ab hier raeumt der Drop von `Bereitgestellt` auf
        let bereitgestellt = Bereitgestellt { pfad };

        datei.write_all(data).await?;
        datei.sync_all().await?;

        tracing::trace!(pfad = %bereitgestellt.pfad.display(), bytes = data.len(), "Temp-Datei geschrieben");
        Ok(bereitgestellt)
    }

    /// Macht eine bereitgestellte Datei unter `name` sichtbar
    ///
    /// Nur `AlreadyExists` wird als `NameBelegt` gemeldet, alle anderen
    /// IO-Fehler werden sofort weitergereicht.
    pub async fn commit(&self, bereitgestellt: &Bereitgestellt, name: &str) -> ChatResult<Commit> {
        let ziel = self.full_path(name);
        match tokio::fs::hard_link(&bereitgestellt.pfad, &ziel).await {
            Ok(()) => {
                self.verzeichnis_synchronisieren().await;
                tracing::debug!(pfad = %ziel.display(), "Datei festgeschrieben");
                Ok(Commit::Festgeschrieben)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(Commit::NameBelegt),
            Err(e) => Err(e.into()),
        }
    }

    /// Datei laden
    pub async fn retrieve(&self, name: &str) -> ChatResult<Vec<u8>> {
        let full = self.full_path(name);
        let data = tokio::fs::read(&full).await?;
        tracing::trace!(path = %full.display(), bytes = data.len(), "Datei gelesen");
        Ok(data)
    }

    /// Namen aller festgeschriebenen Nachrichtendateien (unsortiert)
    pub async fn list_names(&self) -> ChatResult<Vec<String>> {
        let mut namen = Vec::new();
        let mut eintraege = tokio::fs::read_dir(&self.base_dir).await?;

        while let Some(eintrag) = eintraege.next_entry().await? {
            let Ok(name) = eintrag.file_name().into_string() else {
                continue;
            };
            if !ist_nachrichtenname(&name) {
                continue;
            }
            if !eintrag.file_type().await?.is_file() {
                continue;
            }
            namen.push(name);
        }

        Ok(namen)
    }

    /// Entfernt Temp-Dateien, die aelter als `max_alter` sind
    ///
    /// Bleiben nur nach einem Absturz zwischen Schreiben und Aufraeumen
    /// liegen. Juengere Temp-Dateien gehoeren womoeglich einem laufenden
    /// Schreiber und bleiben unangetastet.
    pub async fn verwaiste_entfernen(&self, max_alter: Duration) -> ChatResult<usize> {
        let jetzt = SystemTime::now();
        let mut entfernt = 0;
        let mut eintraege = tokio::fs::read_dir(&self.base_dir).await?;

        while let Some(eintrag) = eintraege.next_entry().await? {
            let Ok(name) = eintrag.file_name().into_string() else {
                continue;
            };
            if !(name.starts_with('.') && name.ends_with(TEMP_ENDUNG)) {
                continue;
            }
            let geaendert = match eintrag.metadata().await.and_then(|m| m.modified()) {
                Ok(zeit) => zeit,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let alter = jetzt.duration_since(geaendert).unwrap_or_default();
            if alter < max_alter {
                continue;
            }
            match tokio::fs::remove_file(eintrag.path()).await {
                Ok(()) => {
                    tracing::debug!(datei = %name, alter_s = alter.as_secs(), "Verwaiste Temp-Datei entfernt");
                    entfernt += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(entfernt)
    }

    #[cfg(unix)]
    async fn verzeichnis_synchronisieren(&self) {
        // Damit der neue Verzeichniseintrag einen Absturz uebersteht
        let ergebnis = match tokio::fs::File::open(&self.base_dir).await {
            Ok(verzeichnis) => verzeichnis.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = ergebnis {
            tracing::debug!(%e, "Verzeichnis-Sync fehlgeschlagen");
        }
    }

    #[cfg(not(unix))]
    async fn verzeichnis_synchronisieren(&self) {}
}

/// Ein schlichter Dateiname mit Nachrichten-Endung, nicht versteckt
pub fn ist_nachrichtenname(name: &str) -> bool {
    name.len() > RecordKey::ENDUNG.len()
        && name.ends_with(RecordKey::ENDUNG)
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
}
