//! Textual wallet descriptions fed to the embedder

use crate::wallet::ActivityProfile;

/// Describe a wallet's activity in a few plain sentences
///
/// Unnamed methods are left out of the method list.
pub fn describe_wallet(profile: &ActivityProfile) -> String {
    let methods = profile
        .method_counts
        .iter()
        .filter(|(method, _)| !method.is_empty())
        .map(|(method, count)| format!("{}: {}", method, count))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Wallet made {} transactions.\n\
         Interacted with {} unique contracts.\n\
         Average transaction value: {:.6} ETH.\n\
         Transaction methods: {}.",
        profile.transaction_count, profile.unique_counterparties, profile.average_value, methods
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletTransaction;

    #[test]
    fn test_description_text() {
        let txs = vec![
            WalletTransaction::new(1, 0.5, "mint").with_to("0xaa"),
            WalletTransaction::new(2, 0.25, "mint").with_to("0xbb"),
            WalletTransaction::new(3, 0.0, "transfer").with_to("0xaa"),
            WalletTransaction::new(4, 0.0, ""),
        ];
        let profile = ActivityProfile::from_transactions(&txs);

        assert_eq!(
            describe_wallet(&profile),
            "Wallet made 4 transactions.\n\
             Interacted with 2 unique contracts.\n\
             Average transaction value: 0.187500 ETH.\n\
             Transaction methods: mint: 2, transfer: 1."
        );
    }
}
