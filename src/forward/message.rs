use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;

/// Key collecting the cells of a row that has more fields than the header.
pub const EXTRA_FIELDS_KEY: &str = "_extra";

/// One CSV row as a JSON object keyed by the file's header.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardMessage {
    fields: Map<String, Value>,
}

impl ForwardMessage {
    /// Missing trailing fields become `null`; surplus cells go under [`EXTRA_FIELDS_KEY`].
    pub fn from_record(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let mut fields: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = record
                    .get(i)
                    .map_or(Value::Null, |v| Value::String(v.to_string()));
                (name.to_string(), value)
            })
            .collect();

        if record.len() > headers.len() {
            let extra = record
                .iter()
                .skip(headers.len())
                .map(|v| Value::String(v.to_string()))
                .collect();
            fields.insert(EXTRA_FIELDS_KEY.to_string(), Value::Array(extra));
        }
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Compact JSON, UTF-8 encoded, no trailing delimiter.
    pub fn to_payload(&self) -> Vec<u8> {
        Value::Object(self.fields.clone()).to_string().into_bytes()
    }
}

/// Row-by-row reader over an output file.
pub struct MessageReader {
    reader: csv::Reader<File>,
    headers: csv::StringRecord,
}

impl MessageReader {
    pub fn open(path: &Path) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        Ok(Self { reader, headers })
    }

    pub fn headers(&self) -> &csv::StringRecord {
        &self.headers
    }

    /// Next row, `None` at end of file.
    pub fn next_message(&mut self) -> Option<Result<ForwardMessage, csv::Error>> {
        let mut record = csv::StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(true) => Some(Ok(ForwardMessage::from_record(&self.headers, &record))),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{parse_response, CANONICAL_HEADER};
    use crate::output::{OutputSink, RecordSink};
    use tempfile::TempDir;

    const RECORD: &str = r#""7","alice","10.0.0.1","GET","1024","512","example.com","/a,b","OBSERVED","","1700000000","2023-11-14 22:13:20","https","News","text/html","","12","Allow","200","10.0.0.1","HQ","","Firefox","120.0","Windows NT 10.0; Win64; x64","firefox.exe","93.184.216.34","443""#;

    #[test]
    fn test_written_record_reads_back_identically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let mut sink = OutputSink::open(&path).unwrap();
        sink.append(&parse_response(&format!("{}\n{}\n", CANONICAL_HEADER, RECORD)))
            .unwrap();
        sink.close().unwrap();

        let mut reader = MessageReader::open(&path).unwrap();
        assert_eq!(reader.headers().len(), 28);

        let message = reader.next_message().unwrap().unwrap();
        assert_eq!(message.get("username"), Some("alice"));
        assert_eq!(message.get("requested_path"), Some("/a,b"));
        assert_eq!(message.get("virus"), Some(""));
        assert_eq!(
            message.get("user_agent_comment"),
            Some("Windows NT 10.0; Win64; x64")
        );
        assert_eq!(message.get("destination_port"), Some("443"));
        assert!(reader.next_message().is_none());
    }

    #[test]
    fn test_skewed_record_is_still_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        // The API added a column: 29 cells under the 28-column file header.
        let body = format!(
            "{},\"new_field\"\n{},\"surplus\"\n",
            CANONICAL_HEADER, RECORD
        );
        let mut sink = OutputSink::open(&path).unwrap();
        sink.append(&parse_response(&body)).unwrap();
        sink.close().unwrap();

        let mut reader = MessageReader::open(&path).unwrap();
        let message = reader.next_message().unwrap().unwrap();
        assert_eq!(message.get("username"), Some("alice"));
        assert_eq!(message.get("destination_port"), Some("443"));
        assert_eq!(
            message.fields()[EXTRA_FIELDS_KEY],
            Value::Array(vec![Value::String("surplus".to_string())])
        );
        assert_eq!(message.fields().len(), 29);
    }

    #[test]
    fn test_short_record_fills_null() {
        let headers = csv::StringRecord::from(vec!["user_id", "username", "source_ip"]);
        let record = csv::StringRecord::from(vec!["1"]);
        let message = ForwardMessage::from_record(&headers, &record);

        let payload = String::from_utf8(message.to_payload()).unwrap();
        assert_eq!(
            payload,
            r#"{"user_id":"1","username":null,"source_ip":null}"#
        );
    }

    #[test]
    fn test_payload_keeps_header_order() {
        let headers = csv::StringRecord::from(vec!["user_id", "username", "source_ip"]);
        let record = csv::StringRecord::from(vec!["1", "bob", "10.1.1.1"]);
        let message = ForwardMessage::from_record(&headers, &record);

        let payload = String::from_utf8(message.to_payload()).unwrap();
        assert_eq!(
            payload,
            r#"{"user_id":"1","username":"bob","source_ip":"10.1.1.1"}"#
        );
    }
}
