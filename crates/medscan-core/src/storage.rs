use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    medicine::{CatalogEntry, MedicineKey, PendingEntry, VerificationStatus},
    record::{RecordBody, ReportRecord, ScanRecord},
    Error, Result,
};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS medicine_scans (
    id TEXT PRIMARY KEY,
    file_locator TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    extracted_text TEXT NOT NULL,
    extraction_status TEXT NOT NULL,
    structured_data TEXT NOT NULL,
    structuring_origin TEXT NOT NULL,
    status TEXT NOT NULL,
    submitter TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scans_submitter ON medicine_scans(submitter);

CREATE TABLE IF NOT EXISTS medical_reports (
    id TEXT PRIMARY KEY,
    file_locator TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    extracted_text TEXT NOT NULL,
    extraction_status TEXT NOT NULL,
    structured_data TEXT NOT NULL,
    structuring_origin TEXT NOT NULL,
    status TEXT NOT NULL,
    submitter TEXT NOT NULL,
    created_at TEXT NOT NULL,
    report_type TEXT NOT NULL,
    report_date TEXT NOT NULL,
    description TEXT,
    review_status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_submitter ON medical_reports(submitter);
CREATE INDEX IF NOT EXISTS idx_reports_review ON medical_reports(review_status);

CREATE TABLE IF NOT EXISTS catalog_medicines (
    id TEXT PRIMARY KEY,
    brand_name TEXT NOT NULL,
    generic TEXT,
    manufacturer TEXT NOT NULL,
    category TEXT,
    dosage TEXT,
    uses TEXT,
    side_effects TEXT,
    warnings TEXT,
    food_instructions TEXT,
    is_critical INTEGER NOT NULL DEFAULT 0,
    verified_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_catalog_key ON catalog_medicines(brand_name, manufacturer);

CREATE TABLE IF NOT EXISTS pending_medicines (
    id TEXT PRIMARY KEY,
    brand_name TEXT NOT NULL,
    generic TEXT,
    manufacturer TEXT NOT NULL,
    category TEXT,
    dosage TEXT,
    uses TEXT,
    side_effects TEXT,
    warnings TEXT,
    food_instructions TEXT,
    is_critical INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    scanned_at TEXT NOT NULL,
    decided_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_pending_key ON pending_medicines(brand_name, manufacturer);
CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_one_open
    ON pending_medicines(brand_name, manufacturer) WHERE status = 'PENDING';
"#;

const SCAN_COLUMNS: &str = "id, file_locator, original_filename, extracted_text, extraction_status, \
     structured_data, structuring_origin, status, submitter, created_at";

const REPORT_COLUMNS: &str = "id, file_locator, original_filename, extracted_text, extraction_status, \
     structured_data, structuring_origin, status, submitter, created_at, \
     report_type, report_date, description, review_status";

const CATALOG_COLUMNS: &str = "id, brand_name, generic, manufacturer, category, dosage, uses, \
     side_effects, warnings, food_instructions, is_critical, verified_at";

const PENDING_COLUMNS: &str = "id, brand_name, generic, manufacturer, category, dosage, uses, \
     side_effects, warnings, food_instructions, is_critical, status, scanned_at, decided_at";

type ScanRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);

type ReportRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
);

type CatalogRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    String,
);

type PendingRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    String,
    String,
    Option<String>,
);

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn open(path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{path}?mode=rwc"))
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Close the pool; later queries fail with `PoolClosed`
    #[cfg(test)]
    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }

    // Medicine scan records

    pub async fn insert_scan(&self, scan: &ScanRecord) -> Result<()> {
        let body = &scan.body;

        sqlx::query(&format!(
            "INSERT INTO medicine_scans ({SCAN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(body.id.to_string())
        .bind(&body.file_locator)
        .bind(&body.original_filename)
        .bind(&body.extracted_text)
        .bind(body.extraction_status.as_str())
        .bind(&body.structured_data)
        .bind(body.structuring_origin.as_str())
        .bind(body.status.as_str())
        .bind(&body.submitter)
        .bind(timestamp(&body.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_scan(&self, id: Uuid) -> Result<ScanRecord> {
        let row: ScanRow = sqlx::query_as(&format!(
            "SELECT {SCAN_COLUMNS} FROM medicine_scans WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::RecordNotFound(id))?;

        parse_scan_row(row)
    }

    /// Newest first, optionally limited to one submitter
    pub async fn list_scans(&self, submitter: Option<&str>) -> Result<Vec<ScanRecord>> {
        let rows: Vec<ScanRow> = match submitter {
            Some(s) => {
                sqlx::query_as(&format!(
                    "SELECT {SCAN_COLUMNS} FROM medicine_scans WHERE submitter = ? \
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(s)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {SCAN_COLUMNS} FROM medicine_scans ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(parse_scan_row).collect()
    }

    // Medical report records

    pub async fn insert_report(&self, report: &ReportRecord) -> Result<()> {
        let body = &report.body;

        sqlx::query(&format!(
            "INSERT INTO medical_reports ({REPORT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(body.id.to_string())
        .bind(&body.file_locator)
        .bind(&body.original_filename)
        .bind(&body.extracted_text)
        .bind(body.extraction_status.as_str())
        .bind(&body.structured_data)
        .bind(body.structuring_origin.as_str())
        .bind(body.status.as_str())
        .bind(&body.submitter)
        .bind(timestamp(&body.created_at))
        .bind(&report.report_type)
        .bind(report.report_date.to_string())
        .bind(&report.description)
        .bind(&report.review_status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_report(&self, id: Uuid) -> Result<ReportRecord> {
        let row: ReportRow = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM medical_reports WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::RecordNotFound(id))?;

        parse_report_row(row)
    }

    /// A submitter's reports, most recent report date first
    pub async fn list_reports_by_submitter(&self, submitter: &str) -> Result<Vec<ReportRecord>> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM medical_reports WHERE submitter = ? \
             ORDER BY report_date DESC, created_at DESC"
        ))
        .bind(submitter)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_report_row).collect()
    }

    /// Reports in a given review state, oldest upload first
    pub async fn list_reports_by_review_status(
        &self,
        review_status: &str,
    ) -> Result<Vec<ReportRecord>> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM medical_reports WHERE review_status = ? \
             ORDER BY created_at ASC"
        ))
        .bind(review_status)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_report_row).collect()
    }

    pub async fn update_review_status(&self, id: Uuid, review_status: &str) -> Result<()> {
        let result = sqlx::query("UPDATE medical_reports SET review_status = ? WHERE id = ?")
            .bind(review_status)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound(id));
        }

        Ok(())
    }

    // Catalog

    pub async fn find_catalog_entry(&self, key: &MedicineKey) -> Result<Option<CatalogEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch_catalog_entry(&mut conn, key).await
    }

    /// Returns false when an entry with the same key already exists
    pub async fn insert_catalog_entry(&self, entry: &CatalogEntry) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        write_catalog_entry(&mut conn, entry).await
    }

    pub async fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let rows: Vec<CatalogRow> = sqlx::query_as(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_medicines ORDER BY brand_name, manufacturer"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_catalog_row).collect()
    }

    // Pending queue

    /// The open (PENDING) entry for a key, if any
    pub async fn find_pending(&self, key: &MedicineKey) -> Result<Option<PendingEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch_open_pending(&mut conn, key).await
    }

    /// Queue an entry. Returns false when an open entry for the same key
    /// already exists, in which case nothing is written.
    pub async fn insert_pending(&self, entry: &PendingEntry) -> Result<bool> {
        let result = sqlx::query(&format!(
            "INSERT INTO pending_medicines ({PENDING_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(entry.id.to_string())
        .bind(&entry.brand_name)
        .bind(&entry.generic)
        .bind(&entry.manufacturer)
        .bind(&entry.category)
        .bind(&entry.dosage)
        .bind(&entry.uses)
        .bind(&entry.side_effects)
        .bind(&entry.warnings)
        .bind(&entry.food_instructions)
        .bind(entry.is_critical)
        .bind(entry.status.as_str())
        .bind(timestamp(&entry.scanned_at))
        .bind(entry.decided_at.as_ref().map(timestamp))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(Error::Database(e)),
        }
    }

    /// Open entries, oldest scan first
    pub async fn list_pending(&self) -> Result<Vec<PendingEntry>> {
        let rows: Vec<PendingRow> = sqlx::query_as(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_medicines WHERE status = 'PENDING' \
             ORDER BY scanned_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_pending_row).collect()
    }

    /// Every entry ever queued for a key, decided ones included
    pub async fn pending_history(&self, key: &MedicineKey) -> Result<Vec<PendingEntry>> {
        let rows: Vec<PendingRow> = sqlx::query_as(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_medicines \
             WHERE brand_name = ? AND manufacturer = ? ORDER BY scanned_at ASC"
        ))
        .bind(&key.brand_name)
        .bind(&key.manufacturer)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_pending_row).collect()
    }

    pub async fn count_pending(&self, key: &MedicineKey) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM pending_medicines
            WHERE brand_name = ? AND manufacturer = ? AND status = 'PENDING'
            "#,
        )
        .bind(&key.brand_name)
        .bind(&key.manufacturer)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Approve the open entry for `key` and copy it into the catalog, in
    /// one transaction. If the catalog already holds the key, the existing
    /// entry is returned unchanged.
    pub async fn approve_pending(
        &self,
        key: &MedicineKey,
        decided_at: DateTime<Utc>,
    ) -> Result<CatalogEntry> {
        let mut tx = self.pool.begin().await?;

        let pending = fetch_open_pending(&mut tx, key)
            .await?
            .ok_or_else(|| Error::PendingNotFound(key.clone()))?;
        mark_decided(&mut tx, pending.id, VerificationStatus::Approved, decided_at).await?;

        let mut entry = CatalogEntry::from_pending(&pending);
        entry.verified_at = decided_at;

        let entry = if write_catalog_entry(&mut tx, &entry).await? {
            entry
        } else {
            fetch_catalog_entry(&mut tx, key)
                .await?
                .ok_or_else(|| Error::PendingNotFound(key.clone()))?
        };

        tx.commit().await?;
        Ok(entry)
    }

    /// Reject the open entry for `key`
    pub async fn reject_pending(
        &self,
        key: &MedicineKey,
        decided_at: DateTime<Utc>,
    ) -> Result<PendingEntry> {
        let mut tx = self.pool.begin().await?;

        let mut pending = fetch_open_pending(&mut tx, key)
            .await?
            .ok_or_else(|| Error::PendingNotFound(key.clone()))?;
        mark_decided(&mut tx, pending.id, VerificationStatus::Rejected, decided_at).await?;

        tx.commit().await?;

        pending.status = VerificationStatus::Rejected;
        pending.decided_at = Some(decided_at);
        Ok(pending)
    }
}

async fn fetch_open_pending(
    conn: &mut SqliteConnection,
    key: &MedicineKey,
) -> Result<Option<PendingEntry>> {
    let row: Option<PendingRow> = sqlx::query_as(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_medicines \
         WHERE brand_name = ? AND manufacturer = ? AND status = 'PENDING'"
    ))
    .bind(&key.brand_name)
    .bind(&key.manufacturer)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(parse_pending_row).transpose()
}

async fn mark_decided(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: VerificationStatus,
    decided_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE pending_medicines SET status = ?, decided_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(timestamp(&decided_at))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn fetch_catalog_entry(
    conn: &mut SqliteConnection,
    key: &MedicineKey,
) -> Result<Option<CatalogEntry>> {
    let row: Option<CatalogRow> = sqlx::query_as(&format!(
        "SELECT {CATALOG_COLUMNS} FROM catalog_medicines WHERE brand_name = ? AND manufacturer = ?"
    ))
    .bind(&key.brand_name)
    .bind(&key.manufacturer)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(parse_catalog_row).transpose()
}

async fn write_catalog_entry(conn: &mut SqliteConnection, entry: &CatalogEntry) -> Result<bool> {
    let result = sqlx::query(&format!(
        "INSERT INTO catalog_medicines ({CATALOG_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(brand_name, manufacturer) DO NOTHING"
    ))
    .bind(entry.id.to_string())
    .bind(&entry.brand_name)
    .bind(&entry.generic)
    .bind(&entry.manufacturer)
    .bind(&entry.category)
    .bind(&entry.dosage)
    .bind(&entry.uses)
    .bind(&entry.side_effects)
    .bind(&entry.warnings)
    .bind(&entry.food_instructions)
    .bind(entry.is_critical)
    .bind(timestamp(&entry.verified_at))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(table: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::CorruptRow {
            table,
            detail: format!("timestamp {value:?}: {e}"),
        })
}

fn parse_id(table: &'static str, value: &str) -> Result<Uuid> {
    value.parse().map_err(|e| Error::CorruptRow {
        table,
        detail: format!("id {value:?}: {e}"),
    })
}

fn parse_body(table: &'static str, row: ScanRow) -> Result<RecordBody> {
    let (
        id,
        file_locator,
        original_filename,
        extracted_text,
        extraction_status,
        structured_data,
        structuring_origin,
        status,
        submitter,
        created_at,
    ) = row;

    Ok(RecordBody {
        id: parse_id(table, &id)?,
        file_locator,
        original_filename,
        extracted_text,
        extraction_status: extraction_status.parse()?,
        structured_data,
        structuring_origin: structuring_origin.parse()?,
        status: status.parse()?,
        submitter,
        created_at: parse_timestamp(table, &created_at)?,
    })
}

fn parse_scan_row(row: ScanRow) -> Result<ScanRecord> {
    Ok(ScanRecord {
        body: parse_body("medicine_scans", row)?,
    })
}

fn parse_report_row(row: ReportRow) -> Result<ReportRecord> {
    let (
        id,
        file_locator,
        original_filename,
        extracted_text,
        extraction_status,
        structured_data,
        structuring_origin,
        status,
        submitter,
        created_at,
        report_type,
        report_date,
        description,
        review_status,
    ) = row;

    let report_date = report_date
        .parse::<NaiveDate>()
        .map_err(|err| Error::CorruptRow {
            table: "medical_reports",
            detail: format!("report_date {report_date:?}: {err}"),
        })?;

    Ok(ReportRecord {
        body: parse_body(
            "medical_reports",
            (
                id,
                file_locator,
                original_filename,
                extracted_text,
                extraction_status,
                structured_data,
                structuring_origin,
                status,
                submitter,
                created_at,
            ),
        )?,
        report_type,
        report_date,
        description,
        review_status,
    })
}

fn parse_catalog_row(row: CatalogRow) -> Result<CatalogEntry> {
    let (
        id,
        brand_name,
        generic,
        manufacturer,
        category,
        dosage,
        uses,
        side_effects,
        warnings,
        food_instructions,
        is_critical,
        verified_at,
    ) = row;

    Ok(CatalogEntry {
        id: parse_id("catalog_medicines", &id)?,
        brand_name,
        generic,
        manufacturer,
        category,
        dosage,
        uses,
        side_effects,
        warnings,
        food_instructions,
        is_critical,
        verified_at: parse_timestamp("catalog_medicines", &verified_at)?,
    })
}

fn parse_pending_row(row: PendingRow) -> Result<PendingEntry> {
    let (
        id,
        brand_name,
        generic,
        manufacturer,
        category,
        dosage,
        uses,
        side_effects,
        warnings,
        food_instructions,
        is_critical,
        status,
        scanned_at,
        decided_at,
    ) = row;

    Ok(PendingEntry {
        id: parse_id("pending_medicines", &id)?,
        brand_name,
        generic,
        manufacturer,
        category,
        dosage,
        uses,
        side_effects,
        warnings,
        food_instructions,
        is_critical,
        status: status.parse()?,
        scanned_at: parse_timestamp("pending_medicines", &scanned_at)?,
        decided_at: decided_at
            .map(|d| parse_timestamp("pending_medicines", &d))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ExtractionStatus, StructuringOrigin};
    use crate::medicine::ParsedMedicine;
    use crate::record::{RecordStatus, REVIEW_COMPLETED, REVIEW_PENDING};

    fn body(submitter: &str) -> RecordBody {
        RecordBody {
            id: Uuid::now_v7(),
            file_locator: "/uploads/abc_label.png".into(),
            original_filename: "label.png".into(),
            extracted_text: "CROCIN".into(),
            extraction_status: ExtractionStatus::Ok,
            structured_data: r#"{"brandName":"Crocin"}"#.into(),
            structuring_origin: StructuringOrigin::AiSuccess,
            status: RecordStatus::Complete,
            submitter: submitter.into(),
            created_at: Utc::now(),
        }
    }

    fn report(submitter: &str, date: &str, review: &str) -> ReportRecord {
        ReportRecord {
            body: body(submitter),
            report_type: "Blood Test".into(),
            report_date: date.parse().unwrap(),
            description: None,
            review_status: review.into(),
        }
    }

    #[tokio::test]
    async fn test_scan_round_trip() {
        let storage = Storage::open_memory().await.unwrap();
        let scan = ScanRecord { body: body("patient-1") };

        storage.insert_scan(&scan).await.unwrap();

        let retrieved = storage.get_scan(scan.body.id).await.unwrap();
        assert_eq!(retrieved, scan);

        assert_eq!(storage.list_scans(Some("patient-1")).await.unwrap().len(), 1);
        assert!(storage.list_scans(Some("someone-else")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record() {
        let storage = Storage::open_memory().await.unwrap();

        let result = storage.get_report(Uuid::now_v7()).await;

        assert!(matches!(result, Err(Error::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_report_queries() {
        let storage = Storage::open_memory().await.unwrap();
        let older = report("p1", "2024-01-10", REVIEW_COMPLETED);
        let newer = report("p1", "2024-03-02", REVIEW_PENDING);
        let other = report("p2", "2024-02-01", REVIEW_PENDING);

        for r in [&older, &newer, &other] {
            storage.insert_report(r).await.unwrap();
        }

        let mine = storage.list_reports_by_submitter("p1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].body.id, newer.body.id);

        let queue = storage.list_reports_by_review_status(REVIEW_PENDING).await.unwrap();
        assert_eq!(queue.len(), 2);

        storage
            .update_review_status(newer.body.id, REVIEW_COMPLETED)
            .await
            .unwrap();
        let queue = storage.list_reports_by_review_status(REVIEW_PENDING).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].body.id, other.body.id);
    }

    #[tokio::test]
    async fn test_update_review_status_unknown_id() {
        let storage = Storage::open_memory().await.unwrap();

        let result = storage.update_review_status(Uuid::now_v7(), REVIEW_COMPLETED).await;

        assert!(matches!(result, Err(Error::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_catalog_key_is_unique() {
        let storage = Storage::open_memory().await.unwrap();
        let first = CatalogEntry::new("Amoxil250".into(), "GenPharma".into());
        let second = CatalogEntry::new("Amoxil250".into(), "GenPharma".into());

        assert!(storage.insert_catalog_entry(&first).await.unwrap());
        assert!(!storage.insert_catalog_entry(&second).await.unwrap());

        let found = storage
            .find_catalog_entry(&MedicineKey::new("Amoxil250", "GenPharma"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);

        // exact, case-sensitive match
        let miss = storage
            .find_catalog_entry(&MedicineKey::new("amoxil250", "GenPharma"))
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_one_open_pending_per_key() {
        let storage = Storage::open_memory().await.unwrap();
        let parsed = ParsedMedicine::new("Paracetamol500", "Acme");
        let key = parsed.key();

        assert!(storage.insert_pending(&PendingEntry::from_parsed(&parsed)).await.unwrap());
        assert!(!storage.insert_pending(&PendingEntry::from_parsed(&parsed)).await.unwrap());
        assert_eq!(storage.count_pending(&key).await.unwrap(), 1);

        storage.reject_pending(&key, Utc::now()).await.unwrap();

        // decided entries no longer block a new one
        assert!(storage.insert_pending(&PendingEntry::from_parsed(&parsed)).await.unwrap());
        assert_eq!(storage.pending_history(&key).await.unwrap().len(), 2);
        assert_eq!(storage.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_copies_into_catalog() {
        let storage = Storage::open_memory().await.unwrap();
        let mut parsed = ParsedMedicine::new("Zyrtec", "UCB");
        parsed.generic = serde_json::json!("Cetirizine");
        let key = parsed.key();
        storage.insert_pending(&PendingEntry::from_parsed(&parsed)).await.unwrap();

        let entry = storage.approve_pending(&key, Utc::now()).await.unwrap();

        assert_eq!(entry.generic.as_deref(), Some("Cetirizine"));
        assert!(storage.find_pending(&key).await.unwrap().is_none());
        assert!(storage.find_catalog_entry(&key).await.unwrap().is_some());

        let history = storage.pending_history(&key).await.unwrap();
        assert_eq!(history[0].status, VerificationStatus::Approved);
        assert!(history[0].decided_at.is_some());
    }

    #[tokio::test]
    async fn test_decide_without_open_entry() {
        let storage = Storage::open_memory().await.unwrap();
        let key = MedicineKey::new("Ghost", "Nobody");

        assert!(matches!(
            storage.approve_pending(&key, Utc::now()).await,
            Err(Error::PendingNotFound(_))
        ));
        assert!(matches!(
            storage.reject_pending(&key, Utc::now()).await,
            Err(Error::PendingNotFound(_))
        ));
    }
}
