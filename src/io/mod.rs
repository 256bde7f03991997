//! Adapters for the outside world: the remote workbook, the spreadsheet
//! reader, and the allow-list file.

pub mod excel_read;
pub mod fetch;
pub mod users;
