//! [`SqliteStore`] — the SQLite implementation of [`SubjectStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use dosewatch_core::{
  medicine::{MedicineRecord, NewMedicine},
  store::SubjectStore,
  subject::Subject,
};

use crate::{
  Error, Result,
  encode::{
    RawMedicine, RawSubject, encode_date, encode_dt, encode_times, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A dosewatch subject store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Check that a subject row exists, without loading its medicines.
  async fn subject_exists(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM subjects WHERE subject_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn subject_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubject> {
  Ok(RawSubject {
    subject_id: row.get(0)?,
    contact:    row.get(1)?,
    created_at: row.get(2)?,
  })
}

fn medicine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMedicine> {
  Ok(RawMedicine {
    record_id:   row.get(0)?,
    subject_id:  row.get(1)?,
    name:        row.get(2)?,
    times_json:  row.get(3)?,
    start_date:  row.get(4)?,
    end_date:    row.get(5)?,
    notes:       row.get(6)?,
    recorded_at: row.get(7)?,
  })
}

const MEDICINE_COLUMNS: &str =
  "record_id, subject_id, name, times_json, start_date, end_date, notes, recorded_at";

fn query_medicines(
  conn: &rusqlite::Connection,
  subject_id: &str,
) -> rusqlite::Result<Vec<RawMedicine>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {MEDICINE_COLUMNS} FROM medicines
     WHERE subject_id = ?1
     ORDER BY recorded_at, record_id"
  ))?;
  stmt
    .query_map(rusqlite::params![subject_id], medicine_row)?
    .collect()
}

fn decode_records(raws: Vec<RawMedicine>) -> Result<Vec<MedicineRecord>> {
  raws
    .into_iter()
    .map(|raw| raw.into_record().map(|(_, record)| record))
    .collect()
}

/// Column values for one `medicines` row, pre-encoded off the closure.
struct MedicineRow {
  record_id:   String,
  name:        String,
  times_json:  String,
  start_date:  String,
  end_date:    String,
  notes:       String,
  recorded_at: String,
}

fn encode_record(record: &MedicineRecord) -> Result<MedicineRow> {
  Ok(MedicineRow {
    record_id:   encode_uuid(record.record_id),
    name:        record.name.clone(),
    times_json:  encode_times(&record.times)?,
    start_date:  encode_date(record.start_date),
    end_date:    encode_date(record.end_date),
    notes:       record.notes.clone(),
    recorded_at: encode_dt(record.recorded_at),
  })
}

fn insert_rows(
  conn: &mut rusqlite::Connection,
  subject_id: &str,
  rows: &[MedicineRow],
  replace_existing: bool,
) -> rusqlite::Result<()> {
  let tx = conn.transaction()?;
  if replace_existing {
    tx.execute(
      "DELETE FROM medicines WHERE subject_id = ?1",
      rusqlite::params![subject_id],
    )?;
  }
  for row in rows {
    tx.execute(
      &format!("INSERT INTO medicines ({MEDICINE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
      rusqlite::params![
        row.record_id,
        subject_id,
        row.name,
        row.times_json,
        row.start_date,
        row.end_date,
        row.notes,
        row.recorded_at,
      ],
    )?;
  }
  tx.commit()
}

// ─── SubjectStore impl ───────────────────────────────────────────────────────

impl SubjectStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, contact: String) -> Result<Subject> {
    if self.find_by_contact(&contact).await?.is_some() {
      return Err(Error::ContactTaken(contact));
    }

    let subject = Subject {
      subject_id: Uuid::new_v4(),
      contact,
      created_at: Utc::now(),
      medicines: Vec::new(),
    };

    let id_str = encode_uuid(subject.subject_id);
    let contact_str = subject.contact.clone();
    let at_str = encode_dt(subject.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (subject_id, contact, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, contact_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<(RawSubject, Vec<RawMedicine>)> = self
      .conn
      .call(move |conn| {
        let subject = conn
          .query_row(
            "SELECT subject_id, contact, created_at FROM subjects WHERE subject_id = ?1",
            rusqlite::params![id_str],
            subject_row,
          )
          .optional()?;

        match subject {
          Some(s) => {
            let medicines = query_medicines(conn, &s.subject_id)?;
            Ok(Some((s, medicines)))
          }
          None => Ok(None),
        }
      })
      .await?;

    raw
      .map(|(s, medicines)| s.into_subject(decode_records(medicines)?))
      .transpose()
  }

  async fn find_by_contact(&self, contact: &str) -> Result<Option<Subject>> {
    let contact_str = contact.to_string();

    let raw: Option<(RawSubject, Vec<RawMedicine>)> = self
      .conn
      .call(move |conn| {
        let subject = conn
          .query_row(
            "SELECT subject_id, contact, created_at FROM subjects WHERE contact = ?1",
            rusqlite::params![contact_str],
            subject_row,
          )
          .optional()?;

        match subject {
          Some(s) => {
            let medicines = query_medicines(conn, &s.subject_id)?;
            Ok(Some((s, medicines)))
          }
          None => Ok(None),
        }
      })
      .await?;

    raw
      .map(|(s, medicines)| s.into_subject(decode_records(medicines)?))
      .transpose()
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let (raw_subjects, raw_medicines): (Vec<RawSubject>, Vec<RawMedicine>) = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_id, contact, created_at FROM subjects ORDER BY created_at, subject_id",
        )?;
        let subjects = stmt
          .query_map([], subject_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY recorded_at, record_id"
        ))?;
        let medicines = stmt
          .query_map([], medicine_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((subjects, medicines))
      })
      .await?;

    // Group medicines by owner, preserving per-subject order.
    let mut by_owner: std::collections::HashMap<Uuid, Vec<MedicineRecord>> =
      std::collections::HashMap::new();
    for raw in raw_medicines {
      let (owner, record) = raw.into_record()?;
      by_owner.entry(owner).or_default().push(record);
    }

    raw_subjects
      .into_iter()
      .map(|raw| {
        let id = crate::encode::decode_uuid(&raw.subject_id)?;
        raw.into_subject(by_owner.remove(&id).unwrap_or_default())
      })
      .collect()
  }

  // ── Medicines ─────────────────────────────────────────────────────────────

  async fn append_medicines(
    &self,
    subject_id: Uuid,
    input: Vec<NewMedicine>,
  ) -> Result<Vec<MedicineRecord>> {
    for medicine in &input {
      medicine.validate().map_err(Error::Core)?;
    }
    if !self.subject_exists(subject_id).await? {
      return Err(Error::SubjectNotFound(subject_id));
    }

    let now = Utc::now();
    let records: Vec<MedicineRecord> = input
      .into_iter()
      .map(|m| MedicineRecord {
        record_id:   Uuid::new_v4(),
        name:        m.name,
        times:       m.times,
        start_date:  m.start_date,
        end_date:    m.end_date,
        notes:       m.notes,
        recorded_at: now,
      })
      .collect();

    let subject_id_str = encode_uuid(subject_id);
    let rows = records.iter().map(encode_record).collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        insert_rows(conn, &subject_id_str, &rows, false)?;
        Ok(())
      })
      .await?;

    Ok(records)
  }

  async fn replace_medicines(
    &self,
    subject_id: Uuid,
    medicines: Vec<MedicineRecord>,
  ) -> Result<()> {
    if !self.subject_exists(subject_id).await? {
      return Err(Error::SubjectNotFound(subject_id));
    }

    let subject_id_str = encode_uuid(subject_id);
    let rows = medicines.iter().map(encode_record).collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        insert_rows(conn, &subject_id_str, &rows, true)?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn remove_medicine(&self, subject_id: Uuid, record_id: Uuid) -> Result<()> {
    let subject_id_str = encode_uuid(subject_id);
    let record_id_str = encode_uuid(record_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM medicines WHERE subject_id = ?1 AND record_id = ?2",
          rusqlite::params![subject_id_str, record_id_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn delete_subject(&self, subject_id: Uuid) -> Result<()> {
    let subject_id_str = encode_uuid(subject_id);

    self
      .conn
      .call(move |conn| {
        // medicines rows go with it via ON DELETE CASCADE
        conn.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          rusqlite::params![subject_id_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }
}
