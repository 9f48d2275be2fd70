//! pain.008.001.02 customer direct-debit initiation.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use super::writer::{amount as fmt_amount, XmlWriter};
use super::{
    invalid, validate_account, validate_money, Creditor, DirectDebitPayment, Installment,
    PartyAccount, SepaDocument, SepaError, SepaGenerator, SepaInstruction, SequenceType,
};

const PAIN_008_NS: &str = "urn:iso:std:iso:20022:tech:xsd:pain.008.001.02";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

fn validate(
    creditor: &Creditor,
    debtor: &PartyAccount,
    payment: &DirectDebitPayment,
) -> Result<(), SepaError> {
    validate_account("creditor", &creditor.account)?;
    validate_account("debtor", debtor)?;
    if creditor.scheme_id.trim().is_empty() {
        return Err(invalid("creditor scheme id is required"));
    }
    if payment.mandate_ref.trim().is_empty() {
        return Err(invalid("mandate reference is required"));
    }
    validate_money(&payment.reference, payment.amount, &payment.currency)
}

/// Due date of installment `number` (1-based): one calendar month apart,
/// clamped to the end of shorter months.
pub fn installment_due_date(base: NaiveDate, number: u32) -> Result<NaiveDate, SepaError> {
    base.checked_add_months(Months::new(number.saturating_sub(1)))
        .ok_or_else(|| invalid(format!("installment {number} due date is out of range")))
}

/// Equal share of `total` per installment, rounded half-to-even to cents.
/// The rounding remainder is not redistributed.
pub fn installment_amount(total: Decimal, count: u32) -> Decimal {
    let mut share =
        (total / Decimal::from(count)).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    share.rescale(2);
    share
}

impl SepaGenerator {
    /// One-off (`OOFF`) direct debit as a pain.008 XML string.
    pub fn generate(
        &self,
        creditor: &Creditor,
        debtor: &PartyAccount,
        payment: &DirectDebitPayment,
    ) -> Result<String, SepaError> {
        Ok(self.direct_debit(creditor, debtor, payment)?.xml)
    }

    #[tracing::instrument(skip_all, fields(reference = %payment.reference))]
    pub fn direct_debit(
        &self,
        creditor: &Creditor,
        debtor: &PartyAccount,
        payment: &DirectDebitPayment,
    ) -> Result<SepaDocument, SepaError> {
        validate(creditor, debtor, payment)?;
        let document = self.build(creditor, debtor, payment, payment.amount, payment.due_date, None)?;
        tracing::info!(
            message_id = %document.instruction.message_id,
            amount = %document.instruction.amount,
            "SEPA direct debit generated"
        );
        Ok(document)
    }

    /// Split `payment` into `count` monthly collections, one document each.
    #[tracing::instrument(skip_all, fields(reference = %payment.reference, count = count))]
    pub fn generate_installments(
        &self,
        creditor: &Creditor,
        debtor: &PartyAccount,
        payment: &DirectDebitPayment,
        count: u32,
    ) -> Result<Vec<SepaDocument>, SepaError> {
        if count < 1 {
            return Err(invalid("installment count must be at least 1"));
        }
        validate(creditor, debtor, payment)?;

        // EndToEndId of the last installment is "<reference>-<count>"
        let suffixed_len = payment.reference.trim().chars().count() + 1 + count.to_string().len();
        if suffixed_len > 35 {
            return Err(invalid(format!(
                "payment reference is too long for {count} installments: \
                 EndToEndId would be {suffixed_len} characters, the limit is 35"
            )));
        }

        let share = installment_amount(payment.amount, count);
        if share <= Decimal::ZERO {
            return Err(invalid(format!(
                "{} split into {count} installments rounds to zero",
                payment.amount
            )));
        }

        let documents = (1..=count)
            .map(|number| {
                let due_date = installment_due_date(payment.due_date, number)?;
                let installment = Installment { number, of: count };
                self.build(creditor, debtor, payment, share, due_date, Some(installment))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            installments = count,
            amount = %share,
            "SEPA installment schedule generated"
        );
        Ok(documents)
    }

    fn build(
        &self,
        creditor: &Creditor,
        debtor: &PartyAccount,
        payment: &DirectDebitPayment,
        amount: Decimal,
        due_date: NaiveDate,
        installment: Option<Installment>,
    ) -> Result<SepaDocument, SepaError> {
        let (message_id, payment_info_id, created_at) =
            self.message_ids(installment.map(|i| i.number));
        let sequence_type = SequenceType::for_installment(installment);
        let reference = payment.reference.trim().to_string();
        let end_to_end_id = match installment {
            Some(i) => format!("{reference}-{}", i.number),
            None => reference.clone(),
        };
        let mandate_ref = payment.mandate_ref.trim().to_string();
        let filename = match installment {
            Some(i) => format!("sepa-direct-debit-{mandate_ref}-inst{}.xml", i.number),
            None => format!("sepa-direct-debit-{mandate_ref}.xml"),
        };

        let instruction = SepaInstruction {
            message_id,
            payment_info_id,
            end_to_end_id,
            payment_reference: reference,
            sequence_type: Some(sequence_type),
            amount,
            currency: payment.currency.clone(),
            due_date,
            mandate_ref: Some(mandate_ref),
            debtor_account: debtor.normalized(),
            creditor_account: creditor.account.normalized(),
            installment,
            created_at,
        };

        let xml = self.write_pain008(creditor, payment, &instruction)?;
        Ok(SepaDocument {
            filename,
            instruction,
            xml,
        })
    }

    fn write_pain008(
        &self,
        creditor: &Creditor,
        payment: &DirectDebitPayment,
        ins: &SepaInstruction,
    ) -> Result<String, SepaError> {
        let amount = fmt_amount(ins.amount);
        let cdtr = &ins.creditor_account;
        let dbtr = &ins.debtor_account;
        let initiating = self.initiating_party.as_deref().unwrap_or(cdtr.name.as_str());

        let mut w = XmlWriter::new()?;
        w.start_with_attrs("Document", &[("xmlns", PAIN_008_NS), ("xmlns:xsi", XSI_NS)])?;
        w.start("CstmrDrctDbtInitn")?;

        w.start("GrpHdr")?;
        w.text("MsgId", &ins.message_id)?;
        w.text("CreDtTm", &ins.created_at.format("%Y-%m-%dT%H:%M:%S").to_string())?;
        w.text("NbOfTxs", "1")?;
        w.text("CtrlSum", &amount)?;
        w.nested(&["InitgPty", "Nm"], initiating)?;
        w.end("GrpHdr")?;

        w.start("PmtInf")?;
        w.text("PmtInfId", &ins.payment_info_id)?;
        w.text("PmtMtd", "DD")?;
        w.text("NbOfTxs", "1")?;
        w.text("CtrlSum", &amount)?;
        w.start("PmtTpInf")?;
        w.nested(&["SvcLvl", "Cd"], "SEPA")?;
        w.nested(&["LclInstrm", "Cd"], "CORE")?;
        w.text(
            "SeqTp",
            ins.sequence_type.as_ref().map_or("OOFF", |s| s.as_str()),
        )?;
        w.end("PmtTpInf")?;
        w.text("ReqdColltnDt", &ins.due_date.format("%Y-%m-%d").to_string())?;
        w.nested(&["Cdtr", "Nm"], &cdtr.name)?;
        w.nested(&["CdtrAcct", "Id", "IBAN"], &cdtr.iban)?;
        w.nested(&["CdtrAgt", "FinInstnId", "BIC"], &cdtr.bic)?;
        w.text("ChrgBr", "SLEV")?;
        w.start("CdtrSchmeId")?;
        w.start("Id")?;
        w.start("PrvtId")?;
        w.start("Othr")?;
        w.text("Id", creditor.scheme_id.trim())?;
        w.nested(&["SchmeNm", "Prtry"], "SEPA")?;
        w.end("Othr")?;
        w.end("PrvtId")?;
        w.end("Id")?;
        w.end("CdtrSchmeId")?;

        w.start("DrctDbtTxInf")?;
        w.nested(&["PmtId", "EndToEndId"], &ins.end_to_end_id)?;
        w.text_with_attrs("InstdAmt", &[("Ccy", ins.currency.as_str())], &amount)?;
        w.start("DrctDbtTx")?;
        w.start("MndtRltdInf")?;
        w.text("MndtId", ins.mandate_ref.as_deref().unwrap_or_default())?;
        w.text(
            "DtOfSgntr",
            &payment.mandate_signed_on.format("%Y-%m-%d").to_string(),
        )?;
        w.end("MndtRltdInf")?;
        w.end("DrctDbtTx")?;
        w.nested(&["DbtrAgt", "FinInstnId", "BIC"], &dbtr.bic)?;
        w.nested(&["Dbtr", "Nm"], &dbtr.name)?;
        w.nested(&["DbtrAcct", "Id", "IBAN"], &dbtr.iban)?;
        let remittance = match (&payment.remittance_info, ins.installment) {
            (Some(text), Some(i)) => format!("{} ({}/{})", text.trim(), i.number, i.of),
            (Some(text), None) => text.trim().to_string(),
            (None, Some(i)) => format!("{} ({}/{})", ins.payment_reference, i.number, i.of),
            (None, None) => ins.payment_reference.clone(),
        };
        w.nested(&["RmtInf", "Ustrd"], &remittance)?;
        w.end("DrctDbtTxInf")?;

        w.end("PmtInf")?;
        w.end("CstmrDrctDbtInitn")?;
        w.end("Document")?;
        w.into_string()
    }
}
