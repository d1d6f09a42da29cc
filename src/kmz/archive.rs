use std::io::{Cursor, Write};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use super::document::ExportDocument;

/// Name of the KML entry inside a KMZ archive.
pub const KML_ENTRY_NAME: &str = "doc.kml";

pub const KMZ_MEDIA_TYPE: &str = "application/vnd.google-earth.kmz";

/// Package KML text as an in-memory KMZ: a deflated ZIP with a single `doc.kml` entry.
pub fn write_kmz(kml: &str) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(KML_ENTRY_NAME, options)?;
    zip.write_all(kml.as_bytes())?;
    Ok(zip.finish()?.into_inner())
}

impl ExportDocument {
    pub fn to_kmz(&self) -> anyhow::Result<Vec<u8>> {
        write_kmz(&self.to_kml_string()?)
    }
}

/// Read the `doc.kml` entry back out of a KMZ archive.
#[cfg(test)]
pub fn read_kmz_document(kmz: &[u8]) -> anyhow::Result<String> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(Cursor::new(kmz))?;
    let mut kml = String::new();
    archive.by_name(KML_ENTRY_NAME)?.read_to_string(&mut kml)?;
    Ok(kml)
}
