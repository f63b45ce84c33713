//! Key derivation for an uploaded archive: decoding the notification key,
//! the folder its entries are written to, and the name of its backup copy.

use chrono::{NaiveDateTime, Timelike};

const ZIP_SUFFIX: &str = ".zip";

/// Decodes an object key as delivered in an S3 notification.
///
/// `+` stands for a space. Invalid UTF-8 is replaced rather than rejected
/// and malformed escapes are kept as-is.
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

/// Prefix that extracted entries are written under: the key up to its first
/// `.zip`, followed by `/`. Keys without `.zip` have no destination.
pub fn destination_prefix(decoded_key: &str) -> Option<String> {
    decoded_key
        .find(ZIP_SUFFIX)
        .map(|idx| format!("{}/", &decoded_key[..idx]))
}

/// File name of the archive without folders or its last `.zip`.
pub fn archive_base_name(decoded_key: &str) -> &str {
    let file_name = decoded_key
        .rsplit_once('/')
        .map_or(decoded_key, |(_, name)| name);
    file_name
        .rsplit_once(ZIP_SUFFIX)
        .map_or(file_name, |(stem, _)| stem)
}

pub fn backup_key(backup_folder: &str, decoded_key: &str, timestamp: &NaiveDateTime) -> String {
    format!(
        "{}/{}_{}{}",
        backup_folder.trim_end_matches('/'),
        archive_base_name(decoded_key),
        iso_timestamp(timestamp),
        ZIP_SUFFIX
    )
}

/// ISO-8601 with microseconds, which are left out entirely when zero.
fn iso_timestamp(timestamp: &NaiveDateTime) -> String {
    if timestamp.nanosecond() / 1_000 == 0 {
        timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// URL-encoded `bucket/key` as expected by `CopyObject`. Slashes between
/// key segments are left intact.
pub fn copy_source(bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(14, 5, 7, 123456)
            .unwrap()
    }

    #[test]
    fn test_decode_plus_and_percent_escapes() {
        assert_eq!(decode_key("a+b%20c"), "a b c");
        assert_eq!(decode_key("uploads/my+report%282%29.zip"), "uploads/my report(2).zip");
    }

    #[test]
    fn test_decode_never_fails_on_bad_input() {
        assert_eq!(decode_key("100%zz.zip"), "100%zz.zip");
        assert_eq!(decode_key("bad%FFbyte.zip"), "bad\u{FFFD}byte.zip");
        assert_eq!(decode_key("trailing%"), "trailing%");
    }

    #[test]
    fn test_decode_multibyte_utf8() {
        assert_eq!(decode_key("caf%C3%A9.zip"), "café.zip");
    }

    #[test]
    fn test_destination_prefix() {
        assert_eq!(
            destination_prefix("uploads/report.zip").as_deref(),
            Some("uploads/report/")
        );
        assert_eq!(destination_prefix("report.zip").as_deref(), Some("report/"));
    }

    #[test]
    fn test_destination_prefix_cuts_at_first_zip() {
        assert_eq!(
            destination_prefix("a/b.zip.backup.zip").as_deref(),
            Some("a/b/")
        );
        assert_eq!(destination_prefix("a.zipper/x.zip").as_deref(), Some("a/"));
    }

    #[test]
    fn test_destination_prefix_is_stable() {
        let key = "nested/dir/archive.zip";
        let first = destination_prefix(key);
        assert_eq!(first, destination_prefix(key));
        assert_eq!(first, destination_prefix(key));
    }

    #[test]
    fn test_destination_prefix_without_zip() {
        assert_eq!(destination_prefix("uploads/report.tar.gz"), None);
    }

    #[test]
    fn test_archive_base_name() {
        assert_eq!(archive_base_name("uploads/report.zip"), "report");
        assert_eq!(archive_base_name("a/b/c/deep.zip"), "deep");
        assert_eq!(archive_base_name("report.zip"), "report");
        assert_eq!(archive_base_name("uploads/noext"), "noext");
        assert_eq!(archive_base_name("uploads/"), "");
        assert_eq!(archive_base_name("uploads/my.zipcode.zip"), "my.zipcode");
        assert_eq!(archive_base_name("a.zip/b.zip"), "b");
    }

    #[test]
    fn test_backup_key_format() {
        assert_eq!(
            backup_key("archive", "uploads/report.zip", &timestamp()),
            "archive/report_2024-03-09T14:05:07.123456.zip"
        );
        assert_eq!(
            backup_key("archive/", "report.zip", &timestamp()),
            "archive/report_2024-03-09T14:05:07.123456.zip"
        );
    }

    #[test]
    fn test_backup_key_whole_second_timestamp() {
        let whole_second = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        assert_eq!(
            backup_key("archive", "uploads/report.zip", &whole_second),
            "archive/report_2024-03-09T14:05:07.zip"
        );
    }

    #[test]
    fn test_copy_source_encodes_segments() {
        assert_eq!(
            copy_source("bucket", "uploads/my report.zip"),
            "bucket/uploads/my%20report.zip"
        );
    }
}
