//! Bounded in-memory log of SMS sends.

use super::AppState;
use crate::types::SentSms;

/// Oldest entries are dropped once the log is full.
const SENT_SMS_LOG_CAPACITY: usize = 100;

impl AppState {
    pub async fn record_sent_sms(&self, sms: SentSms) {
        let mut log = self.sent_sms.write().await;
        if log.len() == SENT_SMS_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(sms);
    }

    pub async fn sent_sms_log(&self) -> Vec<SentSms> {
        self.sent_sms.read().await.iter().cloned().collect()
    }
}
