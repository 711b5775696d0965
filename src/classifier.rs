//! Transfer classification
//!
//! Attaches wallet identity to every input and output of a transfer and
//! derives its representation: sender, recipient, fee, net amount and type.

use futures::future::try_join_all;

use crate::error::ProcessorError;
use crate::model::{
    InOutput, Representation, TransferDetails, TransferType, WalletRef, EXTERNAL_LABEL,
};
use crate::resolver::AddressResolver;

#[derive(Clone)]
pub struct TransactionClassifier {
    resolver: AddressResolver,
}

impl TransactionClassifier {
    pub fn new(resolver: AddressResolver) -> Self {
        Self { resolver }
    }

    /// Set `wallet` on every input and output from its `node_id`.
    ///
    /// Lookups for the entries of one transfer run concurrently. Entries
    /// without a known address end up with no wallet. Any store failure
    /// aborts the whole annotation and leaves `details` untouched.
    pub async fn annotate(&self, details: &mut TransferDetails) -> Result<(), ProcessorError> {
        let inputs = try_join_all(
            details
                .inputs
                .iter()
                .map(|entry| self.resolver.wallet_for_node(entry.node_id.as_deref())),
        );
        let outputs = try_join_all(
            details
                .outputs
                .iter()
                .map(|entry| self.resolver.wallet_for_node(entry.node_id.as_deref())),
        );
        let (input_wallets, output_wallets) = futures::try_join!(inputs, outputs)?;

        for (entry, wallet) in details.inputs.iter_mut().zip(input_wallets) {
            entry.wallet = wallet;
        }
        for (entry, wallet) in details.outputs.iter_mut().zip(output_wallets) {
            entry.wallet = wallet;
        }
        Ok(())
    }
}

fn sum_amounts<'a>(entries: impl Iterator<Item = &'a InOutput>) -> f64 {
    entries.map(|entry| entry.amount).sum()
}

/// Whether `entry` moves value on behalf of someone other than the sender.
///
/// With a sender: any entry not owned by the sender's wallet. Without one:
/// only entries owned by one of the user's wallets.
fn is_foreign_to(entry: &InOutput, sender: Option<&WalletRef>) -> bool {
    match (sender, entry.wallet_id()) {
        (None, None) => false,
        (None, Some(_)) => true,
        (Some(sender), Some(wallet_id)) => wallet_id != sender.id,
        (Some(_), None) => true,
    }
}

/// Classify an annotated transfer.
///
/// The sender is the wallet of the first owned input; inputs from several
/// wallets ("coin mix") are not merged. The recipient is the wallet of the
/// first owned output that is not the sender's.
pub fn classify(details: &TransferDetails) -> Representation {
    let sender = details.inputs.iter().find_map(|input| input.wallet.as_ref());
    let mut recipient = details.outputs.iter().find_map(|output| {
        output
            .wallet
            .as_ref()
            .filter(|wallet| sender.map_or(true, |s| s.id != wallet.id))
    });

    let inputs_value = sum_amounts(details.inputs.iter());
    let outputs_value = sum_amounts(details.outputs.iter());

    // Value leaving to a different party, minus value not funded by the sender
    let mut amount = sum_amounts(
        details
            .outputs
            .iter()
            .filter(|output| is_foreign_to(output, sender)),
    ) - sum_amounts(
        details
            .inputs
            .iter()
            .filter(|input| is_foreign_to(input, sender)),
    );

    // Every input and output belongs to the user: movement between own wallets
    let all_owned = details.entries().all(|entry| entry.wallet.is_some());
    if sender.is_some() && recipient.is_none() && all_owned {
        recipient = details.outputs.first().and_then(|o| o.wallet.as_ref());
        amount = outputs_value;
    }

    let transfer_type = match (sender.is_some(), recipient.is_some()) {
        (true, true) => TransferType::Internal,
        (true, false) => TransferType::Outgoing,
        (false, true) => TransferType::Incoming,
        (false, false) => TransferType::Orphaned,
    };

    let label = |wallet: Option<&WalletRef>| {
        wallet
            .map(|w| w.label.clone())
            .unwrap_or_else(|| EXTERNAL_LABEL.to_string())
    };

    Representation {
        fee: inputs_value - outputs_value,
        sender_labels: vec![label(sender)],
        recipient_labels: vec![label(recipient)],
        transfer_type,
        amount,
    }
}
