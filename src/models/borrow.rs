//! Borrow record model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Number of days after which a still-borrowed book counts as due soon
/// (the loan period is 14 days; the warning window opens halfway through)
pub const DUE_SOON_AFTER_DAYS: i64 = 7;

/// Borrow record status. Only `Borrowed -> Returned` is a valid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrowed" => Ok(BorrowStatus::Borrowed),
            "returned" => Ok(BorrowStatus::Returned),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

// SQLx conversion for BorrowStatus (stored as text)
impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Borrow record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub status: BorrowStatus,
    pub borrow_date: NaiveDate,
    /// Set if and only if status is `returned`
    pub return_date: Option<NaiveDate>,
}

impl BorrowRecord {
    pub fn is_returned(&self) -> bool {
        self.status == BorrowStatus::Returned
    }
}

/// Borrow record joined with its book title (reader history)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowHistoryEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: BorrowRecord,
    pub title: String,
}

/// Borrow record joined with borrower and book (admin listing)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: BorrowRecord,
    pub username: String,
    pub title: String,
}

/// Per-reader borrow counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBorrowStats {
    pub books_borrowed: i64,
    pub currently_reading: i64,
    pub completed_books: i64,
    pub books_due_soon: i64,
}

impl UserBorrowStats {
    /// Fold one record into the counters, as of `today`
    pub fn count(&mut self, record: &BorrowRecord, today: NaiveDate) {
        self.books_borrowed += 1;
        match record.status {
            BorrowStatus::Borrowed => {
                self.currently_reading += 1;
                if record.borrow_date <= due_soon_threshold(today) {
                    self.books_due_soon += 1;
                }
            }
            BorrowStatus::Returned => self.completed_books += 1,
        }
    }
}

/// Latest borrow date that counts as due soon on `today`
pub fn due_soon_threshold(today: NaiveDate) -> NaiveDate {
    today - chrono::Duration::days(DUE_SOON_AFTER_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: BorrowStatus, borrow_date: NaiveDate) -> BorrowRecord {
        BorrowRecord {
            id: 1,
            user_id: 1,
            book_id: 1,
            status,
            borrow_date,
            return_date: (status == BorrowStatus::Returned).then_some(borrow_date),
        }
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [BorrowStatus::Borrowed, BorrowStatus::Returned] {
            assert_eq!(status.as_str().parse::<BorrowStatus>(), Ok(status));
        }
        assert!("lost".parse::<BorrowStatus>().is_err());
    }

    #[test]
    fn test_due_soon_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let mut stats = UserBorrowStats::default();
        // exactly 7 days ago counts, 6 days ago does not
        stats.count(&record(BorrowStatus::Borrowed, today - chrono::Duration::days(7)), today);
        stats.count(&record(BorrowStatus::Borrowed, today - chrono::Duration::days(6)), today);
        // returned records never count as due soon
        stats.count(&record(BorrowStatus::Returned, today - chrono::Duration::days(30)), today);

        assert_eq!(
            stats,
            UserBorrowStats {
                books_borrowed: 3,
                currently_reading: 2,
                completed_books: 1,
                books_due_soon: 1,
            }
        );
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(UserBorrowStats::default()).unwrap();
        assert!(json.get("booksBorrowed").is_some());
        assert!(json.get("booksDueSoon").is_some());
    }

    #[test]
    fn test_history_entry_flattens_record() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let entry = BorrowHistoryEntry {
            record: record(BorrowStatus::Borrowed, today),
            title: "Dune".to_string(),
        };
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(json["status"], "borrowed");
        assert_eq!(json["borrow_date"], "2024-03-15");
        assert_eq!(json["title"], "Dune");
        assert!(json["return_date"].is_null());
    }
}
