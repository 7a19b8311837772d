/// First line of every API v5 response and of every output file.
pub const CANONICAL_HEADER: &str = concat!(
    r#""user_id","username","source_ip","http_action","server_to_client_bytes","client_to_server_bytes","#,
    r#""requested_host","requested_path","result","virus","request_timestamp_epoch","request_timestamp","#,
    r#""uri_scheme","category","media_type","application_type","reputation","last_rule","http_status_code","#,
    r#""client_ip","location","block_reason","user_agent_product","user_agent_version","user_agent_comment","#,
    r#""process_name","destination_ip","destination_port""#
);

pub const CANONICAL_FIELD_COUNT: usize = 28;

/// Result of comparing a response's first line with [`CANONICAL_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCheck {
    Matched,
    /// API version skew; records are still accepted.
    Mismatch { found: String },
    /// The body was empty.
    Absent,
}

/// Records returned for one time window, header excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecordBatch {
    records: Vec<String>,
    header: HeaderCheck,
    response_lines: usize,
    status: Option<u16>,
}

impl RawRecordBatch {
    /// Tags the batch with the HTTP status it was served with.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn records(&self) -> &[String] {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn header(&self) -> &HeaderCheck {
        &self.header
    }

    pub fn header_matched(&self) -> bool {
        self.header == HeaderCheck::Matched
    }

    /// True when the response carried at most a header line.
    pub fn is_no_data(&self) -> bool {
        self.response_lines < 2
    }

    /// Lines in the raw response body, header and blank lines included.
    pub fn response_lines(&self) -> usize {
        self.response_lines
    }
}

/// Splits a CSV response body into a batch.
///
/// Blank lines are dropped and the first line is checked against the
/// canonical header but never returned as a record.
pub fn parse_response(body: &str) -> RawRecordBatch {
    let mut lines = body.lines();
    let response_lines = body.lines().count();

    let header = match lines.next() {
        None => HeaderCheck::Absent,
        Some(first) if first == CANONICAL_HEADER => HeaderCheck::Matched,
        Some(first) => HeaderCheck::Mismatch {
            found: first.to_string(),
        },
    };

    let records = if response_lines < 2 {
        Vec::new()
    } else {
        lines
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    };

    RawRecordBatch {
        records,
        header,
        response_lines,
        status: None,
    }
}
