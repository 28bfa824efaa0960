//! Tests der Sitzungsaushandlung mit einer simulierten Peer-Verbindung

mod engine_tests;
