use std::borrow::Cow;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Names of the computation kinds reported by the engine.
///
/// Kinds marked with `*` are the ones the engine meters against the computation limit.
static COMPUTATION_KINDS: Lazy<FxHashMap<u64, &'static str>> = Lazy::new(|| {
    [
        (1001, "*Statement"),
        (1002, "*Loop"),
        (1003, "*FunctionInvocation"),
        (1010, "CreateCompositeValue"),
        (1011, "TransferCompositeValue"),
        (1012, "DestroyCompositeValue"),
        (1025, "CreateArrayValue"),
        (1026, "TransferArrayValue"),
        (1027, "DestroyArrayValue"),
        (1040, "CreateDictionaryValue"),
        (1041, "TransferDictionaryValue"),
        (1042, "DestroyDictionaryValue"),
        (1100, "STDLIBPanic"),
        (1101, "STDLIBAssert"),
        (1102, "STDLIBUnsafeRandom"),
        (1108, "STDLIBRLPDecodeString"),
        (1109, "STDLIBRLPDecodeList"),
        (2001, "Hash"),
        (2002, "VerifySignature"),
        (2003, "AddAccountKey"),
        (2004, "AddEncodedAccountKey"),
        (2005, "AllocateStorageIndex"),
        (2006, "*CreateAccount"),
        (2007, "EmitEvent"),
        (2008, "GenerateUUID"),
        (2009, "GetAccountAvailableBalance"),
        (2010, "GetAccountBalance"),
        (2011, "GetAccountContractCode"),
        (2012, "GetAccountContractNames"),
        (2013, "GetAccountKey"),
        (2014, "GetBlockAtHeight"),
        (2015, "GetCode"),
        (2016, "GetCurrentBlockHeight"),
        (2017, "GetProgram"),
        (2018, "GetStorageCapacity"),
        (2019, "GetStorageUsed"),
        (2020, "*GetValue"),
        (2021, "RemoveAccountContractCode"),
        (2022, "ResolveLocation"),
        (2023, "RevokeAccountKey"),
        (2034, "RevokeEncodedAccountKey"),
        (2025, "SetProgram"),
        (2026, "*SetValue"),
        (2027, "UpdateAccountContractCode"),
        (2028, "ValidatePublicKey"),
        (2029, "ValueExists"),
    ]
    .into_iter()
    .collect()
});

/// The registered name of a computation kind, if any.
pub fn computation_kind_name(kind: u64) -> Option<&'static str> {
    COMPUTATION_KINDS.get(&kind).copied()
}

/// The display name of a computation kind: its registered name, or the bare code.
pub fn computation_kind_label(kind: u64) -> Cow<'static, str> {
    match computation_kind_name(kind) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(kind.to_string()),
    }
}
