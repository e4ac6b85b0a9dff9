//! Hiroba 共有ライブラリ
//!
//! サーバーとテストの両方から使うユーティリティ（ロガー初期化、時計の抽象化）を提供します。

pub mod logger;
pub mod time;
