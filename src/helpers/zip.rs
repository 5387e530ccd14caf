//! Part lookup inside the ZIP packages used by XLSX and ODS workbooks.

use crate::error::InsightSheetError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a part by name, ignoring ASCII case and normalizing `\` to `/`.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, InsightSheetError>;

    /// Whether the package contains the named part.
    fn contains(&self, name: &str) -> bool;

    /// XML event reader over the named part.
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, InsightSheetError>;

    /// Reads at most `limit` bytes of the named part.
    fn read_prefix(&mut self, name: &str, limit: u64) -> Result<Option<Vec<u8>>, InsightSheetError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, InsightSheetError> {
        let path = match find_name(self, name) {
            Some(path) => path,
            None => return Ok(None),
        };
        match self.by_name(&path) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn contains(&self, name: &str) -> bool {
        find_name(self, name).is_some()
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, InsightSheetError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn read_prefix(&mut self, name: &str, limit: u64) -> Result<Option<Vec<u8>>, InsightSheetError> {
        match self.file(name)? {
            Some(file) => {
                let mut buffer = Vec::new();
                file.take(limit).read_to_end(&mut buffer)?;
                Ok(Some(buffer))
            }
            None => Ok(None),
        }
    }
}

fn find_name<RS: Read + Seek>(zip: &ZipArchive<RS>, name: &str) -> Option<String> {
    let pattern = name.replace('\\', "/");
    zip.file_names()
        .find(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/")))
        .map(|file_name| file_name.to_owned())
}
