//! pain.001.001.03 customer credit-transfer initiation.

use super::writer::{amount as fmt_amount, XmlWriter};
use super::{
    validate_account, validate_money, CreditTransferPayment, PartyAccount, SepaDocument,
    SepaError, SepaGenerator, SepaInstruction,
};

const PAIN_001_NS: &str = "urn:iso:std:iso:20022:tech:xsd:pain.001.001.03";

impl SepaGenerator {
    /// Single outgoing transfer from `debtor` (our account) to `creditor`.
    #[tracing::instrument(skip_all, fields(reference = %payment.reference))]
    pub fn generate_credit_transfer(
        &self,
        debtor: &PartyAccount,
        creditor: &PartyAccount,
        payment: &CreditTransferPayment,
    ) -> Result<SepaDocument, SepaError> {
        validate_account("debtor", debtor)?;
        validate_account("creditor", creditor)?;
        validate_money(&payment.reference, payment.amount, &payment.currency)?;

        let (message_id, payment_info_id, created_at) = self.message_ids(None);
        let reference = payment.reference.trim().to_string();
        let instruction = SepaInstruction {
            message_id,
            payment_info_id,
            end_to_end_id: reference.clone(),
            payment_reference: reference.clone(),
            sequence_type: None,
            amount: payment.amount,
            currency: payment.currency.clone(),
            due_date: payment.execution_date,
            mandate_ref: None,
            debtor_account: debtor.normalized(),
            creditor_account: creditor.normalized(),
            installment: None,
            created_at,
        };

        let xml = self.write_pain001(payment, &instruction)?;
        tracing::info!(
            message_id = %instruction.message_id,
            amount = %instruction.amount,
            "SEPA credit transfer generated"
        );
        Ok(SepaDocument {
            filename: format!("sepa-credit-transfer-{reference}.xml"),
            instruction,
            xml,
        })
    }

    fn write_pain001(
        &self,
        payment: &CreditTransferPayment,
        ins: &SepaInstruction,
    ) -> Result<String, SepaError> {
        let amount = fmt_amount(ins.amount);
        let dbtr = &ins.debtor_account;
        let cdtr = &ins.creditor_account;

        let mut w = XmlWriter::new()?;
        w.start_with_attrs("Document", &[("xmlns", PAIN_001_NS)])?;
        w.start("CstmrCdtTrfInitn")?;

        w.start("GrpHdr")?;
        w.text("MsgId", &ins.message_id)?;
        w.text("CreDtTm", &ins.created_at.format("%Y-%m-%dT%H:%M:%S").to_string())?;
        w.text("NbOfTxs", "1")?;
        w.text("CtrlSum", &amount)?;
        w.nested(
            &["InitgPty", "Nm"],
            self.initiating_party.as_deref().unwrap_or(dbtr.name.as_str()),
        )?;
        w.end("GrpHdr")?;

        w.start("PmtInf")?;
        w.text("PmtInfId", &ins.payment_info_id)?;
        w.text("PmtMtd", "TRF")?;
        w.text("NbOfTxs", "1")?;
        w.text("CtrlSum", &amount)?;
        w.start("PmtTpInf")?;
        w.nested(&["SvcLvl", "Cd"], "SEPA")?;
        w.end("PmtTpInf")?;
        w.text("ReqdExctnDt", &ins.due_date.format("%Y-%m-%d").to_string())?;
        w.nested(&["Dbtr", "Nm"], &dbtr.name)?;
        w.nested(&["DbtrAcct", "Id", "IBAN"], &dbtr.iban)?;
        w.nested(&["DbtrAgt", "FinInstnId", "BIC"], &dbtr.bic)?;
        w.text("ChrgBr", "SLEV")?;

        w.start("CdtTrfTxInf")?;
        w.nested(&["PmtId", "EndToEndId"], &ins.end_to_end_id)?;
        w.start("Amt")?;
        w.text_with_attrs("InstdAmt", &[("Ccy", ins.currency.as_str())], &amount)?;
        w.end("Amt")?;
        w.nested(&["CdtrAgt", "FinInstnId", "BIC"], &cdtr.bic)?;
        w.nested(&["Cdtr", "Nm"], &cdtr.name)?;
        w.nested(&["CdtrAcct", "Id", "IBAN"], &cdtr.iban)?;
        let remittance = payment
            .remittance_info
            .as_deref()
            .map(str::trim)
            .unwrap_or(ins.payment_reference.as_str());
        w.nested(&["RmtInf", "Ustrd"], remittance)?;
        w.end("CdtTrfTxInf")?;

        w.end("PmtInf")?;
        w.end("CstmrCdtTrfInitn")?;
        w.end("Document")?;
        w.into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{clock, creditor, debtor};
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn transfer() -> CreditTransferPayment {
        CreditTransferPayment {
            reference: "PROV-889".into(),
            amount: dec!(1530.2),
            currency: "EUR".into(),
            execution_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            remittance_info: None,
        }
    }

    #[test]
    fn test_credit_transfer_document() {
        let generator = SepaGenerator::new(clock()).with_initiating_party("Fundacion Ejemplo");
        let doc = generator
            .generate_credit_transfer(&creditor().account, &debtor(), &transfer())
            .unwrap();
        assert_eq!(doc.filename, "sepa-credit-transfer-PROV-889.xml");
        assert_eq!(doc.instruction.sequence_type, None);
        assert!(doc.xml.contains("<PmtMtd>TRF</PmtMtd>"));
        assert!(doc.xml.contains("<CtrlSum>1530.20</CtrlSum>"));
        assert!(doc.xml.contains("<ReqdExctnDt>2025-03-10</ReqdExctnDt>"));
        assert!(doc.xml.contains("<Ustrd>PROV-889</Ustrd>"));
    }

    #[test]
    fn test_credit_transfer_requires_valid_accounts() {
        let generator = SepaGenerator::new(clock());
        let mut beneficiary = debtor();
        beneficiary.bic = "X".into();
        let err = generator
            .generate_credit_transfer(&creditor().account, &beneficiary, &transfer())
            .unwrap_err();
        assert!(matches!(err, SepaError::Validation(_)));
    }
}
