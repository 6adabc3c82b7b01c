//! Zone dump: walks the whole name database and writes the synthesized
//! records in presentation form, one per line.

use std::io::Write;
use std::sync::Arc;

use tracing::warn;

use crate::backend::NameSource;
use crate::domain::parse::{parse_value, ErrorSink, ValueResolver};
use crate::error::Error;
use crate::names;

/// Names fetched per `name_scan` batch.
const SCAN_BATCH: u32 = 500;

/// Dumps every `d/` name under `anchor` to `out`.
///
/// Entries whose keys are not domain names are skipped; entries whose
/// values fail to parse are logged and skipped. Import statements resolve
/// through the same source, without a deadline (a dump is a batch job).
pub async fn dump_zone(
    source: &Arc<dyn NameSource>,
    anchor: &str,
    out: &mut impl Write,
) -> Result<(), Error> {
    let imports = ScanResolver(Arc::clone(source));
    let mut start = String::new();
    loop {
        let batch = source.name_scan(&start, SCAN_BATCH).await?;
        let done = batch.len() < SCAN_BATCH as usize;
        // the last name of a full batch seeds the next scan (inclusive),
        // so process everything but that seed
        let take = if done {
            batch.len()
        } else {
            batch.len().saturating_sub(1)
        };

        for (key, raw) in &batch[..take] {
            dump_entry(key, raw, anchor, &imports, out).await?;
        }
        if done {
            return Ok(());
        }
        start = batch[batch.len() - 1].0.clone();
    }
}

async fn dump_entry(
    key: &str,
    raw: &str,
    anchor: &str,
    imports: &ScanResolver,
    out: &mut impl Write,
) -> Result<(), Error> {
    let Ok(basename) = names::key_to_basename(key) else {
        return Ok(());
    };
    let mut sink = ErrorSink::new();
    let value = match parse_value(key, raw, imports, &mut sink).await {
        Ok(value) => value,
        Err(err) => {
            warn!(key, "skipping unparseable value: {err}");
            return Ok(());
        }
    };
    for issue in sink.issues() {
        warn!(key, "{}", issue.message);
    }

    let apex = format!("{basename}.{anchor}.");
    match value.rrs_recursive(&apex, &apex) {
        Ok(records) => {
            for record in records {
                writeln!(out, "{record}")?;
            }
        }
        Err(err) => warn!(key, "cannot synthesize records: {err}"),
    }
    Ok(())
}

struct ScanResolver(Arc<dyn NameSource>);

#[async_trait::async_trait]
impl ValueResolver for ScanResolver {
    async fn raw_value(&self, key: &str) -> Result<String, Error> {
        self.0.name_show(key, "").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// A scan source over a fixed, sorted name list.
    struct FixedSource {
        entries: Vec<(String, String)>,
    }

    #[async_trait]
    impl NameSource for FixedSource {
        async fn name_show(&self, key: &str, _isolation: &str) -> Result<String, Error> {
            self.entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .ok_or(Error::NoSuchDomain)
        }

        async fn name_scan(&self, start: &str, count: u32) -> Result<Vec<(String, String)>, Error> {
            Ok(self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() >= start)
                .take(count as usize)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn dumps_records_in_presentation_form() {
        let source: Arc<dyn NameSource> = Arc::new(FixedSource {
            entries: vec![
                ("d/alpha".to_owned(), r#"{"ip":"1.2.3.4"}"#.to_owned()),
                ("d/beta".to_owned(), r#"{"map":{"www":{"ip":"5.6.7.8"}}}"#.to_owned()),
                ("nonsense".to_owned(), "{}".to_owned()),
            ],
        });
        let mut out = Vec::new();
        dump_zone(&source, "bit", &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("alpha.bit."));
        assert!(text.contains("www.beta.bit."));
        assert!(text.contains("1.2.3.4"));
        // the non-domain key is skipped entirely
        assert!(!text.contains("nonsense"));
    }

    #[tokio::test]
    async fn unparseable_values_are_skipped() {
        let source: Arc<dyn NameSource> = Arc::new(FixedSource {
            entries: vec![
                ("d/bad".to_owned(), "not json".to_owned()),
                ("d/good".to_owned(), r#"{"ip":"1.2.3.4"}"#.to_owned()),
            ],
        });
        let mut out = Vec::new();
        dump_zone(&source, "bit", &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("good.bit."));
        assert!(!text.contains("bad.bit."));
    }
}
