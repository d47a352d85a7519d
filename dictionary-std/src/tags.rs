//! Data element tag declarations
//!
//! Each constant maps an attribute alias to its DICOM tag.
//! The same table feeds the run-time dictionary registry.

use netdicom_core::dictionary::DataDictionaryEntryRef;
use netdicom_core::dictionary::VM::{AtLeast, Exactly, Single};
use netdicom_core::header::{Tag, VR};

macro_rules! attributes {
    ($($name: ident = ($group: literal, $elem: literal), $alias: literal, $vr: ident, $vm: expr;)*) => {
        $(
            #[doc = $alias]
            #[rustfmt::skip]
            pub const $name: Tag = Tag($group, $elem);
        )*

        /// All attribute entries known to the standard dictionary.
        pub(crate) const ENTRIES: &[DataDictionaryEntryRef<'static>] = &[
            $(
                DataDictionaryEntryRef {
                    tag: Tag($group, $elem),
                    alias: $alias,
                    vr: VR::$vr,
                    vm: $vm,
                },
            )*
        ];
    };
}

attributes! {
    COMMAND_GROUP_LENGTH = (0x0000, 0x0000), "CommandGroupLength", UL, Single;
    AFFECTED_SOP_CLASS_UID = (0x0000, 0x0002), "AffectedSOPClassUID", UI, Single;
    REQUESTED_SOP_CLASS_UID = (0x0000, 0x0003), "RequestedSOPClassUID", UI, Single;
    COMMAND_FIELD = (0x0000, 0x0100), "CommandField", US, Single;
    MESSAGE_ID = (0x0000, 0x0110), "MessageID", US, Single;
    MESSAGE_ID_BEING_RESPONDED_TO = (0x0000, 0x0120), "MessageIDBeingRespondedTo", US, Single;
    MOVE_DESTINATION = (0x0000, 0x0600), "MoveDestination", AE, Single;
    PRIORITY = (0x0000, 0x0700), "Priority", US, Single;
    COMMAND_DATA_SET_TYPE = (0x0000, 0x0800), "CommandDataSetType", US, Single;
    STATUS = (0x0000, 0x0900), "Status", US, Single;
    OFFENDING_ELEMENT = (0x0000, 0x0901), "OffendingElement", AT, AtLeast(1);
    ERROR_COMMENT = (0x0000, 0x0902), "ErrorComment", LO, Single;
    ERROR_ID = (0x0000, 0x0903), "ErrorID", US, Single;
    AFFECTED_SOP_INSTANCE_UID = (0x0000, 0x1000), "AffectedSOPInstanceUID", UI, Single;
    REQUESTED_SOP_INSTANCE_UID = (0x0000, 0x1001), "RequestedSOPInstanceUID", UI, Single;
    NUMBER_OF_REMAINING_SUBOPERATIONS = (0x0000, 0x1020), "NumberOfRemainingSuboperations", US, Single;
    NUMBER_OF_COMPLETED_SUBOPERATIONS = (0x0000, 0x1021), "NumberOfCompletedSuboperations", US, Single;
    NUMBER_OF_FAILED_SUBOPERATIONS = (0x0000, 0x1022), "NumberOfFailedSuboperations", US, Single;
    NUMBER_OF_WARNING_SUBOPERATIONS = (0x0000, 0x1023), "NumberOfWarningSuboperations", US, Single;
    MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE = (0x0000, 0x1030), "MoveOriginatorApplicationEntityTitle", AE, Single;
    MOVE_ORIGINATOR_MESSAGE_ID = (0x0000, 0x1031), "MoveOriginatorMessageID", US, Single;

    SPECIFIC_CHARACTER_SET = (0x0008, 0x0005), "SpecificCharacterSet", CS, AtLeast(1);
    IMAGE_TYPE = (0x0008, 0x0008), "ImageType", CS, AtLeast(2);
    INSTANCE_CREATION_DATE = (0x0008, 0x0012), "InstanceCreationDate", DA, Single;
    INSTANCE_CREATION_TIME = (0x0008, 0x0013), "InstanceCreationTime", TM, Single;
    SOP_CLASS_UID = (0x0008, 0x0016), "SOPClassUID", UI, Single;
    SOP_INSTANCE_UID = (0x0008, 0x0018), "SOPInstanceUID", UI, Single;
    STUDY_DATE = (0x0008, 0x0020), "StudyDate", DA, Single;
    SERIES_DATE = (0x0008, 0x0021), "SeriesDate", DA, Single;
    ACQUISITION_DATE = (0x0008, 0x0022), "AcquisitionDate", DA, Single;
    CONTENT_DATE = (0x0008, 0x0023), "ContentDate", DA, Single;
    ACQUISITION_DATE_TIME = (0x0008, 0x002A), "AcquisitionDateTime", DT, Single;
    STUDY_TIME = (0x0008, 0x0030), "StudyTime", TM, Single;
    SERIES_TIME = (0x0008, 0x0031), "SeriesTime", TM, Single;
    CONTENT_TIME = (0x0008, 0x0033), "ContentTime", TM, Single;
    ACCESSION_NUMBER = (0x0008, 0x0050), "AccessionNumber", SH, Single;
    QUERY_RETRIEVE_LEVEL = (0x0008, 0x0052), "QueryRetrieveLevel", CS, Single;
    RETRIEVE_AE_TITLE = (0x0008, 0x0054), "RetrieveAETitle", AE, AtLeast(1);
    INSTANCE_AVAILABILITY = (0x0008, 0x0056), "InstanceAvailability", CS, Single;
    MODALITY = (0x0008, 0x0060), "Modality", CS, Single;
    MODALITIES_IN_STUDY = (0x0008, 0x0061), "ModalitiesInStudy", CS, AtLeast(1);
    SOP_CLASSES_IN_STUDY = (0x0008, 0x0062), "SOPClassesInStudy", UI, AtLeast(1);
    CONVERSION_TYPE = (0x0008, 0x0064), "ConversionType", CS, Single;
    MANUFACTURER = (0x0008, 0x0070), "Manufacturer", LO, Single;
    INSTITUTION_NAME = (0x0008, 0x0080), "InstitutionName", LO, Single;
    INSTITUTION_ADDRESS = (0x0008, 0x0081), "InstitutionAddress", ST, Single;
    REFERRING_PHYSICIAN_NAME = (0x0008, 0x0090), "ReferringPhysicianName", PN, Single;
    CODE_VALUE = (0x0008, 0x0100), "CodeValue", SH, Single;
    CODING_SCHEME_DESIGNATOR = (0x0008, 0x0102), "CodingSchemeDesignator", SH, Single;
    CODE_MEANING = (0x0008, 0x0104), "CodeMeaning", LO, Single;
    LONG_CODE_VALUE = (0x0008, 0x0119), "LongCodeValue", UC, Single;
    URN_CODE_VALUE = (0x0008, 0x0120), "URNCodeValue", UR, Single;
    TIMEZONE_OFFSET_FROM_UTC = (0x0008, 0x0201), "TimezoneOffsetFromUTC", SH, Single;
    STUDY_DESCRIPTION = (0x0008, 0x1030), "StudyDescription", LO, Single;
    PROCEDURE_CODE_SEQUENCE = (0x0008, 0x1032), "ProcedureCodeSequence", SQ, Single;
    SERIES_DESCRIPTION = (0x0008, 0x103E), "SeriesDescription", LO, Single;
    MANUFACTURER_MODEL_NAME = (0x0008, 0x1090), "ManufacturerModelName", LO, Single;
    REFERENCED_STUDY_SEQUENCE = (0x0008, 0x1110), "ReferencedStudySequence", SQ, Single;
    REFERENCED_SERIES_SEQUENCE = (0x0008, 0x1115), "ReferencedSeriesSequence", SQ, Single;
    REFERENCED_IMAGE_SEQUENCE = (0x0008, 0x1140), "ReferencedImageSequence", SQ, Single;
    REFERENCED_SOP_CLASS_UID = (0x0008, 0x1150), "ReferencedSOPClassUID", UI, Single;
    REFERENCED_SOP_INSTANCE_UID = (0x0008, 0x1155), "ReferencedSOPInstanceUID", UI, Single;
    REFERENCED_SOP_SEQUENCE = (0x0008, 0x1199), "ReferencedSOPSequence", SQ, Single;
    SOURCE_IMAGE_SEQUENCE = (0x0008, 0x2112), "SourceImageSequence", SQ, Single;

    PATIENT_NAME = (0x0010, 0x0010), "PatientName", PN, Single;
    PATIENT_ID = (0x0010, 0x0020), "PatientID", LO, Single;
    ISSUER_OF_PATIENT_ID = (0x0010, 0x0021), "IssuerOfPatientID", LO, Single;
    PATIENT_BIRTH_DATE = (0x0010, 0x0030), "PatientBirthDate", DA, Single;
    PATIENT_BIRTH_TIME = (0x0010, 0x0032), "PatientBirthTime", TM, Single;
    PATIENT_SEX = (0x0010, 0x0040), "PatientSex", CS, Single;
    PATIENT_AGE = (0x0010, 0x1010), "PatientAge", AS, Single;
    PATIENT_SIZE = (0x0010, 0x1020), "PatientSize", DS, Single;
    PATIENT_WEIGHT = (0x0010, 0x1030), "PatientWeight", DS, Single;
    PATIENT_ADDRESS = (0x0010, 0x1040), "PatientAddress", LO, Single;
    ETHNIC_GROUP = (0x0010, 0x2160), "EthnicGroup", SH, Single;
    PATIENT_COMMENTS = (0x0010, 0x4000), "PatientComments", LT, Single;

    BODY_PART_EXAMINED = (0x0018, 0x0015), "BodyPartExamined", CS, Single;
    SLICE_THICKNESS = (0x0018, 0x0050), "SliceThickness", DS, Single;
    SPACING_BETWEEN_SLICES = (0x0018, 0x0088), "SpacingBetweenSlices", DS, Single;
    PROTOCOL_NAME = (0x0018, 0x1030), "ProtocolName", LO, Single;
    ACQUISITION_MATRIX = (0x0018, 0x1310), "AcquisitionMatrix", US, Exactly(4);
    REFERENCE_PIXEL_X0 = (0x0018, 0x6020), "ReferencePixelX0", SL, Single;
    DIFFUSION_B_VALUE = (0x0018, 0x9087), "DiffusionBValue", FD, Single;
    TAG_ANGLE_SECOND_AXIS = (0x0018, 0x9219), "TagAngleSecondAxis", SS, Single;
    PRIMARY_POSITIONER_SCAN_ARC = (0x0018, 0x9511), "PrimaryPositionerScanArc", FL, Single;

    STUDY_INSTANCE_UID = (0x0020, 0x000D), "StudyInstanceUID", UI, Single;
    SERIES_INSTANCE_UID = (0x0020, 0x000E), "SeriesInstanceUID", UI, Single;
    STUDY_ID = (0x0020, 0x0010), "StudyID", SH, Single;
    SERIES_NUMBER = (0x0020, 0x0011), "SeriesNumber", IS, Single;
    ACQUISITION_NUMBER = (0x0020, 0x0012), "AcquisitionNumber", IS, Single;
    INSTANCE_NUMBER = (0x0020, 0x0013), "InstanceNumber", IS, Single;
    IMAGE_POSITION_PATIENT = (0x0020, 0x0032), "ImagePositionPatient", DS, Exactly(3);
    IMAGE_ORIENTATION_PATIENT = (0x0020, 0x0037), "ImageOrientationPatient", DS, Exactly(6);
    FRAME_OF_REFERENCE_UID = (0x0020, 0x0052), "FrameOfReferenceUID", UI, Single;
    LATERALITY = (0x0020, 0x0060), "Laterality", CS, Single;
    IMAGE_LATERALITY = (0x0020, 0x0062), "ImageLaterality", CS, Single;
    SLICE_LOCATION = (0x0020, 0x1041), "SliceLocation", DS, Single;
    NUMBER_OF_PATIENT_RELATED_STUDIES = (0x0020, 0x1200), "NumberOfPatientRelatedStudies", IS, Single;
    NUMBER_OF_PATIENT_RELATED_SERIES = (0x0020, 0x1202), "NumberOfPatientRelatedSeries", IS, Single;
    NUMBER_OF_PATIENT_RELATED_INSTANCES = (0x0020, 0x1204), "NumberOfPatientRelatedInstances", IS, Single;
    NUMBER_OF_STUDY_RELATED_SERIES = (0x0020, 0x1206), "NumberOfStudyRelatedSeries", IS, Single;
    NUMBER_OF_STUDY_RELATED_INSTANCES = (0x0020, 0x1208), "NumberOfStudyRelatedInstances", IS, Single;
    NUMBER_OF_SERIES_RELATED_INSTANCES = (0x0020, 0x1209), "NumberOfSeriesRelatedInstances", IS, Single;
    IMAGE_COMMENTS = (0x0020, 0x4000), "ImageComments", LT, Single;
    TEMPORAL_POSITION_INDEX = (0x0020, 0x9128), "TemporalPositionIndex", UL, Single;
    DIMENSION_INDEX_VALUES = (0x0020, 0x9157), "DimensionIndexValues", UL, AtLeast(1);
    DIMENSION_INDEX_POINTER = (0x0020, 0x9165), "DimensionIndexPointer", AT, Single;
    FUNCTIONAL_GROUP_POINTER = (0x0020, 0x9167), "FunctionalGroupPointer", AT, Single;

    SAMPLES_PER_PIXEL = (0x0028, 0x0002), "SamplesPerPixel", US, Single;
    PHOTOMETRIC_INTERPRETATION = (0x0028, 0x0004), "PhotometricInterpretation", CS, Single;
    NUMBER_OF_FRAMES = (0x0028, 0x0008), "NumberOfFrames", IS, Single;
    ROWS = (0x0028, 0x0010), "Rows", US, Single;
    COLUMNS = (0x0028, 0x0011), "Columns", US, Single;
    PIXEL_SPACING = (0x0028, 0x0030), "PixelSpacing", DS, Exactly(2);
    BITS_ALLOCATED = (0x0028, 0x0100), "BitsAllocated", US, Single;
    BITS_STORED = (0x0028, 0x0101), "BitsStored", US, Single;
    HIGH_BIT = (0x0028, 0x0102), "HighBit", US, Single;
    PIXEL_REPRESENTATION = (0x0028, 0x0103), "PixelRepresentation", US, Single;
    WINDOW_CENTER = (0x0028, 0x1050), "WindowCenter", DS, AtLeast(1);
    WINDOW_WIDTH = (0x0028, 0x1051), "WindowWidth", DS, AtLeast(1);
    RESCALE_INTERCEPT = (0x0028, 0x1052), "RescaleIntercept", DS, Single;
    RESCALE_SLOPE = (0x0028, 0x1053), "RescaleSlope", DS, Single;

    REQUESTED_PROCEDURE_DESCRIPTION = (0x0032, 0x1060), "RequestedProcedureDescription", LO, Single;
    PERFORMED_PROCEDURE_STEP_START_DATE = (0x0040, 0x0244), "PerformedProcedureStepStartDate", DA, Single;
    PERFORMED_PROCEDURE_STEP_START_TIME = (0x0040, 0x0245), "PerformedProcedureStepStartTime", TM, Single;
    REQUEST_ATTRIBUTES_SEQUENCE = (0x0040, 0x0275), "RequestAttributesSequence", SQ, Single;
    REAL_WORLD_VALUE_MAPPING_SEQUENCE = (0x0040, 0x9096), "RealWorldValueMappingSequence", SQ, Single;
    LUT_LABEL = (0x0040, 0x9210), "LUTLabel", SH, Single;
    REAL_WORLD_VALUE_INTERCEPT = (0x0040, 0x9224), "RealWorldValueIntercept", FD, Single;
    REAL_WORLD_VALUE_SLOPE = (0x0040, 0x9225), "RealWorldValueSlope", FD, Single;
    TEXT_VALUE = (0x0040, 0xA160), "TextValue", UT, Single;
    CONTENT_SEQUENCE = (0x0040, 0xA730), "ContentSequence", SQ, Single;

    ENCAPSULATED_DOCUMENT = (0x0042, 0x0011), "EncapsulatedDocument", OB, Single;
    POINT_COORDINATES_DATA = (0x0066, 0x0016), "PointCoordinatesData", OF, Single;
    PIXEL_DATA = (0x7FE0, 0x0010), "PixelData", OW, Single;
}
