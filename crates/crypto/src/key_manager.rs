//! Signier-Identitaet (RSA, PKCS#1 v1.5 mit SHA-256)
//!
//! Der Prozess besitzt genau ein Schluessel-Paar. Es wird beim ersten Start
//! erzeugt und als zwei PEM-Dateien abgelegt:
//! - `local.pem` - privater Schluessel (PKCS#8, nur fuer den Besitzer lesbar)
//! - `local.pub` - oeffentlicher Schluessel (SubjectPublicKeyInfo)
//!
//! Der Fingerprint ist der SHA-256 ueber den oeffentlichen Schluessel in
//! PEM-Form (LF-Zeilenenden), gekuerzt auf 8 Hex-Zeichen. Das entspricht
//! byteweise der Datei, die OpenSSL fuer denselben Schluessel schreibt.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rand_core::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature as RsaSignatur, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use siegel_core::{Fingerprint, Signature};

use crate::error::{CryptoError, CryptoResult};

/// Minimale Modulus-Laenge in Bit
pub const MIN_BITS: usize = 2048;

/// Dateiname des privaten Schluessels
pub const PRIVATER_SCHLUESSEL: &str = "local.pem";

/// Dateiname des oeffentlichen Schluessels
pub const OEFFENTLICHER_SCHLUESSEL: &str = "local.pub";

static TEMP_ZAEHLER: AtomicU64 = AtomicU64::new(0);

/// Besitzt das Schluessel-Paar und stellt Signierung, Verifikation und
/// Identitaet bereit
///
/// Nach dem Laden unveraenderlich und damit ohne Synchronisation von
/// mehreren Tasks gleichzeitig nutzbar.
#[derive(Clone)]
pub struct KeyManager {
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
    public_key: RsaPublicKey,
    public_pem: String,
    fingerprint: Fingerprint,
}

impl KeyManager {
    /// Laedt das Schluessel-Paar aus `verzeichnis` oder erzeugt es (2048 Bit)
    pub fn ensure_key_pair(verzeichnis: impl AsRef<Path>) -> CryptoResult<Self> {
        Self::ensure_key_pair_mit_bits(verzeichnis, MIN_BITS)
    }

    /// Wie [`KeyManager::ensure_key_pair`], mit waehlbarer Schluessellaenge
    /// fuer neu erzeugte Schluessel
    pub fn ensure_key_pair_mit_bits(verzeichnis: impl AsRef<Path>, bits: usize) -> CryptoResult<Self> {
        let verzeichnis = verzeichnis.as_ref();
        let privat_pfad = verzeichnis.join(PRIVATER_SCHLUESSEL);
        let public_pfad = verzeichnis.join(OEFFENTLICHER_SCHLUESSEL);

        let privat_vorhanden = privat_pfad
            .try_exists()
            .map_err(|e| CryptoError::speicher(&privat_pfad, e))?;

        if !privat_vorhanden {
            let public_vorhanden = public_pfad
                .try_exists()
                .map_err(|e| CryptoError::speicher(&public_pfad, e))?;
            // Ein paralleler Erstanleger legt erst local.pem, dann local.pub an
            let inzwischen_angelegt = privat_pfad
                .try_exists()
                .map_err(|e| CryptoError::speicher(&privat_pfad, e))?;
            if public_vorhanden && inzwischen_angelegt {
                let manager = Self::laden(&privat_pfad, &public_pfad)?;
                tracing::debug!(
                    verzeichnis = %verzeichnis.display(),
                    fingerprint = %manager.fingerprint,
                    "Schluessel wurde parallel angelegt, lade vorhandenen"
                );
                return Ok(manager);
            }
            if public_vorhanden {
                return Err(CryptoError::speicher(
                    &privat_pfad,
                    "privater Schluessel fehlt, aber ein oeffentlicher Schluessel existiert",
                ));
            }

            verzeichnis_anlegen(verzeichnis).map_err(|e| CryptoError::speicher(verzeichnis, e))?;

            let privat = schluessel_erzeugen(bits)?;
            let privat_pem = privat
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| CryptoError::SchluesselGenerierung(e.to_string()))?;

            let angelegt = atomar_anlegen(&privat_pfad, privat_pem.as_bytes(), 0o600)
                .map_err(|e| CryptoError::speicher(&privat_pfad, e))?;

            if angelegt {
                let manager = Self::aus_privatem_schluessel(privat)?;
                atomar_anlegen(&public_pfad, manager.public_pem.as_bytes(), 0o644)
                    .map_err(|e| CryptoError::speicher(&public_pfad, e))?;
                tracing::info!(
                    verzeichnis = %verzeichnis.display(),
                    fingerprint = %manager.fingerprint,
                    bits,
                    "Neues Schluessel-Paar erzeugt"
                );
                return Ok(manager);
            }

            // Ein anderer Prozess war schneller: dessen Schluessel gilt
            tracing::debug!(
                pfad = %privat_pfad.display(),
                "Schluessel wurde parallel angelegt, lade vorhandenen"
            );
        }

        let manager = Self::laden(&privat_pfad, &public_pfad)?;
        tracing::info!(
            verzeichnis = %verzeichnis.display(),
            fingerprint = %manager.fingerprint,
            "Schluessel-Paar geladen"
        );
        Ok(manager)
    }

    /// Erzeugt ein Schluessel-Paar nur im Speicher (Tests, Werkzeuge)
    pub fn generieren(bits: usize) -> CryptoResult<Self> {
        Self::aus_privatem_schluessel(schluessel_erzeugen(bits)?)
    }

    fn aus_privatem_schluessel(privat: RsaPrivateKey) -> CryptoResult<Self> {
        let public_key = privat.to_public_key();
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::SchluesselGenerierung(e.to_string()))?;
        let fingerprint = Fingerprint::aus_kodierung(public_pem.as_bytes());

        Ok(Self {
            signing_key: SigningKey::<Sha256>::new(privat),
            verifying_key: VerifyingKey::<Sha256>::new(public_key.clone()),
            public_key,
            public_pem,
            fingerprint,
        })
    }

    fn laden(privat_pfad: &Path, public_pfad: &Path) -> CryptoResult<Self> {
        let privat_pem =
            fs::read_to_string(privat_pfad).map_err(|e| CryptoError::speicher(privat_pfad, e))?;

        // OpenSSL `genpkey` schreibt PKCS#8, aeltere Werkzeuge PKCS#1
        let privat = RsaPrivateKey::from_pkcs8_pem(&privat_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&privat_pem))
            .map_err(|e| {
                CryptoError::speicher(privat_pfad, format!("kein gueltiger RSA-Schluessel: {e}"))
            })?;
        privat
            .validate()
            .map_err(|e| CryptoError::speicher(privat_pfad, format!("Schluessel inkonsistent: {e}")))?;

        let bits = privat.size() * 8;
        if bits < MIN_BITS {
            return Err(CryptoError::speicher(
                privat_pfad,
                format!("Schluessel zu kurz: {bits} Bit (Minimum: {MIN_BITS} Bit)"),
            ));
        }

        let manager = Self::aus_privatem_schluessel(privat)?;

        match fs::read_to_string(public_pfad) {
            Ok(public_pem) => {
                let gespeichert = RsaPublicKey::from_public_key_pem(&public_pem).map_err(|e| {
                    CryptoError::speicher(public_pfad, format!("kein gueltiger oeffentlicher Schluessel: {e}"))
                })?;
                if gespeichert != manager.public_key {
                    return Err(CryptoError::speicher(
                        public_pfad,
                        "oeffentlicher Schluessel passt nicht zum privaten Schluessel",
                    ));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %public_pfad.display(),
                    "Oeffentlicher Schluessel fehlt, wird aus dem privaten abgeleitet"
                );
                atomar_anlegen(public_pfad, manager.public_pem.as_bytes(), 0o644)
                    .map_err(|e| CryptoError::speicher(public_pfad, e))?;
            }
            Err(e) => return Err(CryptoError::speicher(public_pfad, e)),
        }

        Ok(manager)
    }

    /// Identitaet dieses Prozesses (beim Laden berechnet)
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Oeffentlicher Schluessel als PEM (SubjectPublicKeyInfo, LF)
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// Modulus-Laenge in Bit
    pub fn bits(&self) -> usize {
        self.public_key.size() * 8
    }

    /// Signiert `content` (PKCS#1 v1.5, SHA-256), Ergebnis hex-kodiert
    pub fn sign(&self, content: &[u8]) -> CryptoResult<Signature> {
        let signatur = self
            .signing_key
            .try_sign(content)
            .map_err(|e| CryptoError::Signierung(e.to_string()))?;
        Ok(Signature::aus_bytes(&signatur.to_bytes()))
    }

    /// Prueft eine Signatur gegen den eigenen oeffentlichen Schluessel
    ///
    /// Es ist nur dieser eine Schluessel bekannt: fremde Fingerprints,
    /// ungueltiges Hex oder falsche Laengen ergeben `false`, nie einen Fehler.
    pub fn verify(&self, content: &[u8], signature: &Signature, fingerprint: &Fingerprint) -> bool {
        if fingerprint != &self.fingerprint {
            tracing::debug!(
                erwartet = %self.fingerprint,
                erhalten = %fingerprint,
                "Unbekannter Fingerprint"
            );
            return false;
        }
        let Some(bytes) = signature.bytes() else {
            return false;
        };
        let Ok(signatur) = RsaSignatur::try_from(bytes.as_slice()) else {
            return false;
        };
        self.verifying_key.verify(content, &signatur).is_ok()
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "KeyManager {{ fingerprint: {}, bits: {} }}",
            self.fingerprint,
            self.bits()
        )
    }
}

fn schluessel_erzeugen(bits: usize) -> CryptoResult<RsaPrivateKey> {
    if bits < MIN_BITS {
        return Err(CryptoError::SchluesselGenerierung(format!(
            "{bits} Bit sind zu wenig (Minimum: {MIN_BITS} Bit)"
        )));
    }
    RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| CryptoError::SchluesselGenerierung(e.to_string()))
}

fn verzeichnis_anlegen(verzeichnis: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(verzeichnis)
}

/// Legt `ziel` mit `inhalt` an, ohne eine vorhandene Datei zu ersetzen
///
/// Der Inhalt wird zuerst vollstaendig in eine versteckte Temp-Datei
/// geschrieben und dann per Hardlink veroeffentlicht. Gibt `false` zurueck,
/// wenn `ziel` bereits existiert.
fn atomar_anlegen(ziel: &Path, inhalt: &[u8], modus: u32) -> io::Result<bool> {
    let verzeichnis = ziel.parent().unwrap_or_else(|| Path::new("."));
    let name = ziel
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("schluessel");
    let temp = verzeichnis.join(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        TEMP_ZAEHLER.fetch_add(1, Ordering::Relaxed)
    ));

    let mut optionen = fs::OpenOptions::new();
    optionen.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        optionen.mode(modus);
    }
    #[cfg(not(unix))]
    let _ = modus;

    let mut datei = optionen.open(&temp)?;
    let ergebnis = datei
        .write_all(inhalt)
        .and_then(|()| datei.sync_all())
        .and_then(|()| fs::hard_link(&temp, ziel));
    drop(datei);
    let _ = fs::remove_file(&temp);

    match ergebnis {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    /// Ein Schluessel fuer alle Tests, die nur signieren/verifizieren
    fn test_schluessel() -> &'static KeyManager {
        static SCHLUESSEL: OnceLock<KeyManager> = OnceLock::new();
        SCHLUESSEL.get_or_init(|| KeyManager::generieren(MIN_BITS).unwrap())
    }

    #[test]
    fn signieren_und_verifizieren() {
        let keys = test_schluessel();
        let sig = keys.sign(b"hello").unwrap();
        assert_eq!(sig.as_str().len(), 2 * MIN_BITS / 8);
        assert!(keys.verify(b"hello", &sig, keys.fingerprint()));
    }

    #[test]
    fn signatur_ist_deterministisch() {
        let keys = test_schluessel();
        assert_eq!(keys.sign(b"abc").unwrap(), keys.sign(b"abc").unwrap());
    }

    #[test]
    fn leerer_und_mehrzeiliger_inhalt() {
        let keys = test_schluessel();
        for inhalt in ["", "a\n\nb\n", "Gruesse aus Koeln \u{1F600}"] {
            let sig = keys.sign(inhalt.as_bytes()).unwrap();
            assert!(keys.verify(inhalt.as_bytes(), &sig, keys.fingerprint()));
        }
    }

    #[test]
    fn manipulierter_inhalt_wird_abgelehnt() {
        let keys = test_schluessel();
        let inhalt = b"Originaltext".to_vec();
        let sig = keys.sign(&inhalt).unwrap();

        for i in 0..inhalt.len() {
            let mut geaendert = inhalt.clone();
            geaendert[i] ^= 0x01;
            assert!(!keys.verify(&geaendert, &sig, keys.fingerprint()));
        }
    }

    #[test]
    fn manipulierte_signatur_wird_abgelehnt() {
        let keys = test_schluessel();
        let sig = keys.sign(b"Testdaten").unwrap();
        let mut bytes = sig.bytes().unwrap();
        bytes[10] ^= 0xFF;
        let geaendert = Signature::aus_bytes(&bytes);
        assert!(!keys.verify(b"Testdaten", &geaendert, keys.fingerprint()));
    }

    #[test]
    fn ungueltige_signaturen_ergeben_false() {
        let keys = test_schluessel();
        let fp = keys.fingerprint();
        assert!(!keys.verify(b"x", &Signature::aus_hex("nicht-hex"), fp));
        assert!(!keys.verify(b"x", &Signature::aus_hex(""), fp));
        assert!(!keys.verify(b"x", &Signature::aus_hex("abcd"), fp));
    }

    #[test]
    fn fremder_fingerprint_ergibt_false() {
        let keys = test_schluessel();
        let sig = keys.sign(b"hallo").unwrap();
        let fremd: Fingerprint = if keys.fingerprint().as_str() == "00000000" {
            "11111111".parse().unwrap()
        } else {
            "00000000".parse().unwrap()
        };
        assert!(!keys.verify(b"hallo", &sig, &fremd));
    }

    #[test]
    fn zu_kurze_schluessel_abgelehnt() {
        assert!(matches!(
            KeyManager::generieren(1024),
            Err(CryptoError::SchluesselGenerierung(_))
        ));
    }

    #[test]
    fn erzeugen_und_erneut_laden() {
        let dir = tempfile::tempdir().unwrap();
        let erster = KeyManager::ensure_key_pair(dir.path()).unwrap();
        assert!(dir.path().join(PRIVATER_SCHLUESSEL).exists());
        assert!(dir.path().join(OEFFENTLICHER_SCHLUESSEL).exists());

        let zweiter = KeyManager::ensure_key_pair(dir.path()).unwrap();
        assert_eq!(erster.fingerprint(), zweiter.fingerprint());
        assert_eq!(erster.bits(), MIN_BITS);

        // Signatur des ersten Ladens ist mit dem zweiten pruefbar
        let sig = erster.sign(b"persistiert").unwrap();
        assert!(zweiter.verify(b"persistiert", &sig, zweiter.fingerprint()));

        // Keine Temp-Dateien zurueckgelassen
        let eintraege: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(eintraege.len(), 2);
    }

    #[test]
    fn fingerprint_ist_hash_der_public_datei() {
        let dir = tempfile::tempdir().unwrap();
        let keys = KeyManager::ensure_key_pair(dir.path()).unwrap();
        let datei = fs::read(dir.path().join(OEFFENTLICHER_SCHLUESSEL)).unwrap();
        assert_eq!(keys.fingerprint(), &Fingerprint::aus_kodierung(&datei));
        assert_eq!(keys.public_key_pem().as_bytes(), datei.as_slice());
    }

    #[test]
    fn unabhaengige_schluessel_haben_verschiedene_fingerprints() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let ka = KeyManager::ensure_key_pair(a.path()).unwrap();
        let kb = KeyManager::ensure_key_pair(b.path()).unwrap();
        assert_ne!(ka.fingerprint(), kb.fingerprint());

        let sig = ka.sign(b"daten").unwrap();
        assert!(!kb.verify(b"daten", &sig, ka.fingerprint()));
    }

    #[cfg(unix)]
    #[test]
    fn privater_schluessel_nur_fuer_besitzer() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        KeyManager::ensure_key_pair(dir.path()).unwrap();
        let modus = fs::metadata(dir.path().join(PRIVATER_SCHLUESSEL))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(modus & 0o077, 0, "Gruppe/Andere duerfen nichts: {modus:o}");
    }

    #[test]
    fn fehlender_public_wird_neu_geschrieben() {
        let dir = tempfile::tempdir().unwrap();
        let erster = KeyManager::ensure_key_pair(dir.path()).unwrap();
        fs::remove_file(dir.path().join(OEFFENTLICHER_SCHLUESSEL)).unwrap();

        let zweiter = KeyManager::ensure_key_pair(dir.path()).unwrap();
        assert_eq!(erster.fingerprint(), zweiter.fingerprint());
        let datei = fs::read_to_string(dir.path().join(OEFFENTLICHER_SCHLUESSEL)).unwrap();
        assert_eq!(datei, erster.public_key_pem());
    }

    #[test]
    fn paralleler_erststart_ergibt_eine_identitaet() {
        const THREADS: usize = 6;

        let dir = tempfile::tempdir().unwrap();
        let start = std::sync::Arc::new(std::sync::Barrier::new(THREADS));

        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let pfad = dir.path().join("keys");
                let start = std::sync::Arc::clone(&start);
                std::thread::spawn(move || {
                    start.wait();
                    KeyManager::ensure_key_pair(&pfad)
                })
            })
            .collect();

        let fingerprints: Vec<Fingerprint> = threads
            .into_iter()
            .map(|t| t.join().unwrap().unwrap().fingerprint().clone())
            .collect();
        assert!(fingerprints.iter().all(|f| f == &fingerprints[0]));

        let geladen = KeyManager::ensure_key_pair(dir.path().join("keys")).unwrap();
        assert_eq!(geladen.fingerprint(), &fingerprints[0]);

        let eintraege = fs::read_dir(dir.path().join("keys")).unwrap().count();
        assert_eq!(eintraege, 2);
    }

    #[test]
    fn public_ohne_private_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(OEFFENTLICHER_SCHLUESSEL),
            test_schluessel().public_key_pem(),
        )
        .unwrap();

        let result = KeyManager::ensure_key_pair(dir.path());
        assert!(matches!(result, Err(CryptoError::SchluesselSpeicher { .. })));
    }

    #[test]
    fn kaputter_private_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PRIVATER_SCHLUESSEL), "kein PEM").unwrap();

        let result = KeyManager::ensure_key_pair(dir.path());
        assert!(matches!(result, Err(CryptoError::SchluesselSpeicher { .. })));
        // Nichts wurde ueberschrieben
        let inhalt = fs::read_to_string(dir.path().join(PRIVATER_SCHLUESSEL)).unwrap();
        assert_eq!(inhalt, "kein PEM");
    }

    #[test]
    fn fremder_public_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        KeyManager::ensure_key_pair(dir.path()).unwrap();
        fs::write(
            dir.path().join(OEFFENTLICHER_SCHLUESSEL),
            test_schluessel().public_key_pem(),
        )
        .unwrap();

        let result = KeyManager::ensure_key_pair(dir.path());
        assert!(matches!(result, Err(CryptoError::SchluesselSpeicher { .. })));
    }

    #[test]
    fn pkcs1_schluessel_wird_akzeptiert() {
        use rsa::pkcs1::EncodeRsaPrivateKey;

        let dir = tempfile::tempdir().unwrap();
        let privat = RsaPrivateKey::new(&mut OsRng, MIN_BITS).unwrap();
        let pem = privat.to_pkcs1_pem(LineEnding::LF).unwrap();
        fs::write(dir.path().join(PRIVATER_SCHLUESSEL), pem.as_bytes()).unwrap();

        let keys = KeyManager::ensure_key_pair(dir.path()).unwrap();
        let sig = keys.sign(b"alt").unwrap();
        assert!(keys.verify(b"alt", &sig, keys.fingerprint()));
    }
}
